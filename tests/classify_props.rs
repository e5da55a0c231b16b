//! Property tests for category precedence and destination stability

use std::path::Path;

use proptest::prelude::*;

use reorg::core::pattern::PatternMatcher;
use reorg::infra::config::ReorgConfig;

fn matcher() -> PatternMatcher
{
    PatternMatcher::from_config(&ReorgConfig::default()).expect("default patterns compile")
}

fn dirs() -> impl Strategy<Value = Vec<String>>
{
    prop::collection::vec("[a-z]{1,6}", 0..4)
}

fn join(dirs: &[String], file: &str) -> String
{
    let mut parts = dirs.to_vec();
    parts.push(file.to_string());
    parts.join("/")
}

proptest! {
    /// Include without exclude selects the category; an exclude match
    /// rules the category out even though an include also matches.
    #[test]
    fn python_files_split_by_test_prefix(dirs in dirs(), stem in "[a-z][a-z_]{0,8}")
    {
        prop_assume!(!stem.starts_with("test_") && stem != "conftest");
        let m = matcher();

        let source = join(&dirs, &format!("{stem}.py"));
        let c = m.classify(Path::new(&source)).expect("source classified");
        prop_assert_eq!(c.category, "python_source");

        let test = join(&dirs, &format!("test_{stem}.py"));
        let c = m.classify(Path::new(&test)).expect("test classified");
        prop_assert_eq!(c.category, "python_test");
    }

    #[test]
    fn excluded_markdown_is_never_documentation(dirs in dirs())
    {
        let m = matcher();
        for name in ["README.md", "CHANGELOG.md", "LICENSE.md"]
        {
            let path = join(&dirs, name);
            let category = m
                .classify(Path::new(&path))
                .map(|c| c.category);
            prop_assert_ne!(category.as_deref(), Some("documentation"));
        }
    }

    /// A file placed at its destination stays there.
    #[test]
    fn destinations_are_fixed_points(dirs in dirs(), stem in "[a-z]{1,8}", test in any::<bool>())
    {
        let m = matcher();
        let file = if test { format!("test_{stem}.py") } else { format!("{stem}.py") };
        let path = join(&dirs, &file);

        let first = m.place(Path::new(&path)).expect("placed");
        let second = m.place(Path::new(&first.destination)).expect("placed again");
        prop_assert_eq!(&first.destination, &second.destination);
        prop_assert_eq!(first.category, second.category);
    }
}
