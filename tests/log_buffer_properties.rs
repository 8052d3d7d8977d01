use portvisor::supervisor::LogBuffer;
use proptest::prelude::*;

fn message_of(line: &str) -> &str {
    line.split_once("] ").map(|(_, m)| m).unwrap_or(line)
}

proptest! {
    #[test]
    fn recent_is_bounded_and_chronological(
        capacity in 1usize..64,
        pushes in 0usize..200,
        count in 0usize..300,
    ) {
        let buffer = LogBuffer::new(capacity);
        for i in 0..pushes {
            buffer.push(format!("{i}"));
        }

        prop_assert!(buffer.len() <= capacity);
        prop_assert_eq!(buffer.len(), pushes.min(capacity));

        let recent = buffer.recent(count);
        prop_assert_eq!(recent.len(), count.min(buffer.len()));

        // Oldest first, ending with the newest entry.
        let expected: Vec<String> = (pushes - recent.len()..pushes).map(|i| i.to_string()).collect();
        let got: Vec<&str> = recent.iter().map(|l| message_of(l)).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn since_never_returns_more_than_was_appended(
        capacity in 1usize..32,
        before in 0usize..50,
        after in 0usize..50,
    ) {
        let buffer = LogBuffer::new(capacity);
        for i in 0..before {
            buffer.push(format!("old {i}"));
        }
        let mark = buffer.mark();
        for i in 0..after {
            buffer.push(format!("new {i}"));
        }

        let (entries, next) = buffer.since(mark);
        prop_assert_eq!(entries.len(), after.min(capacity));
        prop_assert!(entries.iter().all(|e| e.message.starts_with("new ")));
        prop_assert_eq!(next, (before + after) as u64);
    }
}
