//! Property-based tests for project identity parsing.
//!
//! These tests use proptest to generate random canonical names and verify
//! that parsing and re-joining are inverse operations.

#[cfg(test)]
mod proptest_tests {
    use crate::identity::ProjectIdentity;
    use proptest::prelude::*;

    proptest! {
        /// Property: parse is a left inverse of the re-join for canonical names
        #[test]
        fn parse_then_join_is_identity(
            name in "[a-z][a-z_]{0,10}(-[a-z_]{1,8}){0,2}",
            core in 5u8..12,
            version in "[0-9]{1,2}\\.([0-9]{1,2}|x)(-(dev|rc[0-9]|beta[0-9]))?",
            patches in proptest::collection::vec("[a-z0-9]{1,6}", 0..4),
        ) {
            let mut dirname = format!("{}-{}.x-{}", name, core, version);
            for patch in &patches {
                dirname.push('+');
                dirname.push_str(patch);
            }

            let id = ProjectIdentity::parse(&dirname).unwrap();
            prop_assert_eq!(&id.name, &name);
            prop_assert_eq!(&id.version, &version);
            prop_assert_eq!(&id.patches, &patches);
            prop_assert_eq!(id.to_string(), dirname);
        }

        /// Property: names without a core tag segment never parse
        #[test]
        fn names_without_core_tag_fail(input in "[a-z]{1,8}(-[a-z0-9.]{1,6}){0,3}") {
            prop_assume!(!input.contains(".x-"));
            prop_assert!(ProjectIdentity::parse(&input).is_err());
        }
    }
}
