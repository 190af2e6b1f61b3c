// src/app/normalize.rs
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "m4v", "mpg", "mpeg", "webm"];

static PAREN_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\d{4}\)").expect("static regex"));

pub fn is_video_extension(ext: &str) -> bool {
    VIDEO_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
}

/// Turn a folder or file name into a search query.
///
/// `Movie.Name.2020.mkv` becomes `Movie Name`; `some_movie_(1999)` becomes
/// `some movie`. Without a parenthesized year, the last bare year that is not
/// the first word ends the title, so `Blade.Runner.2049.2017.1080p` keeps its
/// `2049` and `1917` survives as a title of its own.
pub fn normalize(raw_name: &str) -> String {
    let stem = strip_video_extension(raw_name.trim());
    let had_paren_year = PAREN_YEAR.is_match(stem);
    let without_year = PAREN_YEAR.replace_all(stem, " ");
    let spaced = without_year.replace(['.', '_'], " ");

    let words: Vec<&str> = spaced.split_whitespace().collect();
    let cut = if had_paren_year {
        None
    } else {
        words
            .iter()
            .rposition(|w| is_bare_year(w))
            .filter(|&idx| idx > 0)
    };
    words[..cut.unwrap_or(words.len())].iter().join(" ")
}

fn strip_video_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if is_video_extension(ext) => stem,
        _ => name,
    }
}

fn is_bare_year(word: &str) -> bool {
    word.len() == 4
        && word.bytes().all(|b| b.is_ascii_digit())
        && word
            .parse::<u16>()
            .map_or(false, |y| (1900..=2099).contains(&y))
}

#[cfg(test)]
mod tests {
    use super::normalize;

    #[test]
    fn strips_extension_dots_and_trailing_year() {
        assert_eq!(normalize("Movie.Name.2020.mkv"), "Movie Name");
        assert_eq!(normalize("Inception.2010.mkv"), "Inception");
    }

    #[test]
    fn drops_parenthesized_year_and_underscores() {
        assert_eq!(normalize("some_movie_(1999)"), "some movie");
        assert_eq!(normalize("The Thing (1982) Remastered"), "The Thing Remastered");
    }

    #[test]
    fn release_tags_after_year_are_dropped() {
        assert_eq!(
            normalize("Blade.Runner.1982.1080p.BluRay.x264.MKV"),
            "Blade Runner"
        );
    }

    #[test]
    fn leading_year_is_a_title() {
        assert_eq!(normalize("2012 (2009)"), "2012");
        assert_eq!(normalize("1917.2019.mp4"), "1917");
    }

    #[test]
    fn year_inside_title_survives() {
        assert_eq!(
            normalize("Blade.Runner.2049.2017.1080p.mkv"),
            "Blade Runner 2049"
        );
        assert_eq!(normalize("Blade Runner 2049 (2017)"), "Blade Runner 2049");
        assert_eq!(normalize("Death.Race.2000.1975.mkv"), "Death Race 2000");
        assert_eq!(normalize("2001 A Space Odyssey (1968)"), "2001 A Space Odyssey");
    }

    #[test]
    fn unknown_extension_is_kept_as_words() {
        assert_eq!(normalize("Heat.srt"), "Heat srt");
    }

    #[test]
    fn degenerate_input_is_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" ._(2001)_. "), "");
        assert_eq!(normalize(".mkv"), "");
    }
}
