// tests/property/framing_test.rs

//! Properties of the line terminator added to client messages.

use mudbridge::gateway::terminate_line;
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_terminator_adds_exactly_one_newline(message in ".{0,256}") {
        let line = terminate_line(message.clone());
        prop_assert!(line.ends_with('\n'));
        prop_assert_eq!(line.len(), message.len() + 1);
        prop_assert_eq!(&line[..message.len()], message.as_str());
    }

    #[test]
    fn test_concatenated_lines_split_back_into_messages(
        messages in prop::collection::vec("[^\n]{0,64}", 1..32)
    ) {
        let stream: String = messages.iter().cloned().map(terminate_line).collect();
        let recovered: Vec<&str> = stream.split_terminator('\n').collect();
        prop_assert_eq!(recovered.len(), messages.len());
        for (got, sent) in recovered.iter().zip(&messages) {
            prop_assert_eq!(*got, sent.as_str());
        }
    }
}
