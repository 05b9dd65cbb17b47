//! Filename classification for episodic and movie media
//!
//! Classification answers two independent questions about a file name:
//! what *kind* of file it is (video or subtitle, decided purely by its
//! extension, case-insensitive) and whether its name carries an episode
//! identity. A name can match an episode pattern yet have an unsupported
//! extension; such files are reported as unrecognized rather than queued.
//!
//! Supported episode patterns, tried in order with the first match
//! winning:
//!
//! - `Show.Name.S01E02.mkv` - `S<digits>E<digits>`, any run of `.`, `_`,
//!   `-` or whitespace as separator, an optional trailing `E<digits>`
//!   for multi-episode files
//! - `Show_Name.1x02.mkv` - the `<season>x<episode>` form with an
//!   optional `-<digits>` range suffix
//!
//! Multi-episode captures are recorded but the file is always filed
//! under its first episode number.

use std::sync::LazyLock;

use regex::Regex;

/// Video container extensions eligible for transfer (lowercase).
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "avi", "flv", "m4v", "mkv", "mov", "mp4", "mpeg", "mpg", "ts", "webm", "wmv",
];

/// Subtitle extensions recognized as transfer companions (lowercase).
pub const SUBTITLE_EXTENSIONS: &[&str] = &["ass", "idx", "srt", "ssa", "sub", "vtt"];

static EPISODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?P<title>.+?)[\s._-]+s(?P<season>\d+)[\s._-]*e(?P<episode>\d+)(?:[\s._-]*e(?P<second>\d+))?",
    )
    .unwrap()
});

static SEASON_X_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<title>.+?)[\s._-]+(?P<season>\d+)x(?P<episode>\d+)(?:-(?P<second>\d+))?")
        .unwrap()
});

// "sample", "trailer" and "extra"/"extras" as standalone tokens
static JUNK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[\s._()\[\]-])(?:sample|trailer|extras?)(?:[\s._()\[\]-]|$)").unwrap()
});

/// Episode identity parsed from a file name. Derived once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeIdentity {
    /// Raw title fragment preceding the episode marker, still in its
    /// original dotted/underscored spelling.
    pub title: String,
    pub season: u32,
    pub episode: u32,
    /// Second episode number of a multi-episode file; matched but the
    /// file is still filed under `episode`.
    pub second_episode: Option<u32>,
}

/// Result of classifying a single file name (not a path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    /// A video file carrying an episode identity.
    Episode(EpisodeIdentity),
    /// A video file without an episode pattern.
    Movie,
    /// A recognized subtitle file; queued only as a video's companion.
    Subtitle,
    /// Samples, trailers and extras - reported, never queued.
    Junk,
    /// Neither a recognized video/subtitle nor an episodic video.
    Unrecognized,
}

/// Lowercased extension of `name`, if it has one.
///
/// Dotfiles like `.srt` have no stem and therefore no extension.
pub fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn is_video(name: &str) -> bool {
    extension(name).is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_subtitle(name: &str) -> bool {
    extension(name).is_some_and(|ext| SUBTITLE_EXTENSIONS.contains(&ext.as_str()))
}

fn parse_number(digits: &str) -> Option<u32> {
    digits.parse::<u32>().ok()
}

fn match_episode(name: &str) -> Option<EpisodeIdentity> {
    for pattern in [&*EPISODE_RE, &*SEASON_X_RE] {
        if let Some(caps) = pattern.captures(name) {
            let season = parse_number(&caps["season"])?;
            let episode = parse_number(&caps["episode"])?;
            if episode == 0 {
                return None;
            }
            let second_episode = caps.name("second").and_then(|m| parse_number(m.as_str()));
            return Some(EpisodeIdentity {
                title: caps["title"].to_string(),
                season,
                episode,
                second_episode,
            });
        }
    }
    None
}

/// Classify a file name.
///
/// The junk test runs first and takes priority over pattern matching.
pub fn classify(name: &str) -> ParseResult {
    if JUNK_RE.is_match(name) {
        return ParseResult::Junk;
    }
    if is_subtitle(name) {
        return ParseResult::Subtitle;
    }
    match (match_episode(name), is_video(name)) {
        (Some(identity), true) => ParseResult::Episode(identity),
        // episode pattern with an unsupported extension is skipped
        (Some(_), false) => ParseResult::Unrecognized,
        (None, true) => ParseResult::Movie,
        (None, false) => ParseResult::Unrecognized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_episode(name: &str) -> EpisodeIdentity {
        match classify(name) {
            ParseResult::Episode(identity) => identity,
            other => panic!("{name:?} classified as {other:?}, expected episode"),
        }
    }

    #[test]
    fn sxxeyy_dot_separated() {
        let id = expect_episode("Show.Name.S01E02.mkv");
        assert_eq!(id.title, "Show.Name");
        assert_eq!(id.season, 1);
        assert_eq!(id.episode, 2);
        assert_eq!(id.second_episode, None);
    }

    #[test]
    fn sxxeyy_space_and_hyphen_separated() {
        let id = expect_episode("Show Name - S1E2.mp4");
        assert_eq!(id.title, "Show Name");
        assert_eq!(id.season, 1);
        assert_eq!(id.episode, 2);
    }

    #[test]
    fn single_digit_and_padded_groups_both_match() {
        assert_eq!(expect_episode("a.S1E2.mkv").season, 1);
        assert_eq!(expect_episode("a.S01E02.mkv").season, 1);
        assert_eq!(expect_episode("a.S2024E01.mkv").season, 2024);
    }

    #[test]
    fn multi_episode_filed_under_first() {
        let id = expect_episode("Show.S01E01E02.mkv");
        assert_eq!(id.episode, 1);
        assert_eq!(id.second_episode, Some(2));
        let id = expect_episode("Show.S01E03-E04.mkv");
        assert_eq!(id.episode, 3);
        assert_eq!(id.second_episode, Some(4));
    }

    #[test]
    fn season_x_episode_form() {
        let id = expect_episode("Show_Name.1x02.mkv");
        assert_eq!(id.title, "Show_Name");
        assert_eq!(id.season, 1);
        assert_eq!(id.episode, 2);
    }

    #[test]
    fn season_x_episode_with_range_suffix() {
        let id = expect_episode("Show.1x02-03.mkv");
        assert_eq!(id.episode, 2);
        assert_eq!(id.second_episode, Some(3));
    }

    #[test]
    fn leading_zeros_parse_as_decimal() {
        let id = expect_episode("Show.S09E08.mkv");
        assert_eq!(id.season, 9);
        assert_eq!(id.episode, 8);
    }

    #[test]
    fn junk_takes_priority_over_episode_pattern() {
        assert_eq!(classify("The.Show.S01E01.Sample.mkv"), ParseResult::Junk);
        assert_eq!(classify("Movie.Trailer.mp4"), ParseResult::Junk);
        assert_eq!(classify("Show.S01.Extras.mkv"), ParseResult::Junk);
        assert_eq!(classify("extra-scene.mkv"), ParseResult::Junk);
    }

    #[test]
    fn junk_requires_a_standalone_token() {
        // "extraction" contains "extra" but not as a token
        assert_eq!(classify("Extraction.2020.mkv"), ParseResult::Movie);
    }

    #[test]
    fn non_episodic_video_is_a_movie() {
        assert_eq!(classify("Blade.Runner.2049.mkv"), ParseResult::Movie);
        assert_eq!(classify("movie.MP4"), ParseResult::Movie);
    }

    #[test]
    fn subtitles_by_extension() {
        assert_eq!(classify("Show.S01E02.srt"), ParseResult::Subtitle);
        assert_eq!(classify("Movie.IDX"), ParseResult::Subtitle);
        assert_eq!(classify("Movie.sub"), ParseResult::Subtitle);
    }

    #[test]
    fn episode_pattern_with_unsupported_extension_is_unrecognized() {
        assert_eq!(classify("Show.S01E02.nfo"), ParseResult::Unrecognized);
        assert_eq!(classify("Show.S01E02"), ParseResult::Unrecognized);
    }

    #[test]
    fn unknown_names_are_unrecognized() {
        assert_eq!(classify("readme.txt"), ParseResult::Unrecognized);
        assert_eq!(classify("cover.jpg"), ParseResult::Unrecognized);
        assert_eq!(classify("noextension"), ParseResult::Unrecognized);
    }

    #[test]
    fn episode_zero_is_rejected() {
        assert_eq!(classify("Show.S01E00.mkv"), ParseResult::Movie);
    }

    #[test]
    fn extension_is_case_insensitive() {
        assert!(is_video("a.MKV"));
        assert!(is_subtitle("a.SRT"));
        assert_eq!(extension(".srt"), None);
        assert_eq!(extension("name."), None);
    }
}
