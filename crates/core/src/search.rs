use crate::grouping::CategoryGrouping;

/// Case-insensitive substring filter over file names. Buckets with no match
/// are left out; an empty term returns the grouping unchanged.
pub fn filter(full: &CategoryGrouping, term: &str) -> CategoryGrouping {
    if term.is_empty() {
        return full.clone();
    }
    let needle = term.to_lowercase();
    let mut view = CategoryGrouping::new();
    for bucket in full.buckets() {
        for file in bucket.files {
            if file.to_lowercase().contains(&needle) {
                view.insert(bucket.primary, bucket.secondary, file);
            }
        }
    }
    view
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CategoryGrouping {
        let mut g = CategoryGrouping::new();
        g.insert("Documents", "API Disabled", "Report-2024.pdf");
        g.insert("Documents", "API Disabled", "notes.txt");
        g.insert("Images", "API Disabled", "holiday_report.jpg");
        g.insert("Music", "API Disabled", "song.mp3");
        g
    }

    #[test]
    fn empty_term_is_identity() {
        let g = sample();
        assert_eq!(filter(&g, ""), g);
    }

    #[test]
    fn match_is_case_insensitive_and_prunes_buckets() {
        let g = sample();
        let view = filter(&g, "REPORT");
        let mut files: Vec<&str> = view.files().collect();
        files.sort();
        assert_eq!(files, ["Report-2024.pdf", "holiday_report.jpg"]);
        assert!(!view.contains_primary("Music"));
        assert_eq!(g.len(), 4);
    }

    #[test]
    fn never_invents_files() {
        let g = sample();
        let view = filter(&g, "o");
        assert!(view.files().all(|f| g.contains(f)));
        assert!(view.files().all(|f| g.locate(f) == view.locate(f)));
        assert!(filter(&g, "zzz").is_empty());
    }
}
