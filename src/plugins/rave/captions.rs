//! Caption splitting for rave videos

/// Appended when only one caption is given
pub const GONE_SUFFIX: &str = "IS GONE";

/// Split on commas, trimming and dropping empty segments
///
/// A single remaining segment gets [`GONE_SUFFIX`] as its second line.
pub fn split_captions(text: &str) -> Vec<String> {
    let mut captions: Vec<String> = text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if captions.len() == 1 {
        captions.push(GONE_SUFFIX.to_string());
    }
    captions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_caption_is_gone() {
        assert_eq!(split_captions("RUST"), vec!["RUST", "IS GONE"]);
        assert_eq!(split_captions("  RUST ,  , "), vec!["RUST", "IS GONE"]);
    }

    #[test]
    fn two_captions_are_kept_trimmed() {
        assert_eq!(split_captions(" MEMORY BUGS , ARE GONE"), vec!["MEMORY BUGS", "ARE GONE"]);
        assert_eq!(split_captions("A,B,C"), vec!["A", "B", "C"]);
    }

    #[test]
    fn nothing_left_means_no_captions() {
        assert!(split_captions("").is_empty());
        assert!(split_captions(" , ,").is_empty());
    }
}
