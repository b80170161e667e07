use proptest::prelude::*;
use smartape_client::chunker::{chunk_count, split_into_chunks};

proptest! {
    #[test]
    fn chunks_cover_input_without_gaps(
        data in proptest::collection::vec(any::<u8>(), 0..5000),
        size in 1usize..2048,
    ) {
        let chunks = split_into_chunks(&data, size).unwrap();

        prop_assert_eq!(chunks.len(), chunk_count(data.len(), size));
        prop_assert_eq!(chunks.len(), (data.len() + size - 1) / size);

        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.index, i);
            if i + 1 < chunks.len() {
                prop_assert_eq!(chunk.len(), size);
            } else {
                prop_assert!(!chunk.is_empty() && chunk.len() <= size);
            }
        }

        let joined: Vec<u8> = chunks.into_iter().flat_map(|c| c.data).collect();
        prop_assert_eq!(joined, data);
    }
}
