use proptest::prelude::*;
use stage_fs::StagePath;

proptest! {
    #[test]
    fn test_normalization_invariants(s in "\\PC*") {
        let path = StagePath::new(&s);
        let as_str = path.as_str();

        prop_assert!(!as_str.contains('\\'));
        prop_assert!(!as_str.contains("//"));
        prop_assert!(!as_str.starts_with('/'));
        prop_assert!(!as_str.ends_with('/'));
        prop_assert!(path.segments().all(|seg| seg != "." && seg != ".."));

        // normalization is idempotent
        let again = StagePath::new(as_str);
        prop_assert_eq!(&again, &path);
    }

    #[test]
    fn test_join_then_strip_returns_segment(a in "[a-z]{1,8}(/[a-z]{1,8}){0,3}", b in "[a-z]{1,8}(/[a-z]{1,8}){0,3}") {
        let base = StagePath::new(&a);
        let joined = base.join(&b);

        prop_assert!(joined.starts_with(&base));
        prop_assert_eq!(joined.strip_prefix(&base), Some(StagePath::new(&b)));
    }
}
