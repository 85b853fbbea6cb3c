//! Property-based tests for outbound message chunking.

use proptest::prelude::*;
use rpi_sim7000::{
    pdu::Multipart,
    transmit::{ChunkPlan, Encoding, OutboundMessage},
    Pdu, PduCodec,
};

fn text_from(alphabet: Vec<char>, max: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(alphabet), 0..max)
        .prop_map(|chars| chars.into_iter().collect::<String>())
}

fn gsm7_text() -> impl Strategy<Value = String> {
    text_from(vec!['a', 'Z', '0', ' ', '@', 'é', '_', '\n', '{', '€', '^'], 700)
}

fn mixed_text() -> impl Strategy<Value = String> {
    text_from(vec!['a', ' ', 'ж', '✓', 'ê', '€', '{', '😀', '𝄞'], 400)
}

fn check_plan(text: &str) -> Result<ChunkPlan, TestCaseError> {
    let plan = ChunkPlan::new(text);
    if plan.length > plan.encoding.capacity() {
        let chunk_size: usize = plan.encoding.chunk_size();
        prop_assert_eq!(plan.count, (plan.length + chunk_size - 1) / chunk_size);
        prop_assert_eq!(plan.bounds(plan.count - 1).end, plan.length);
    } else {
        prop_assert_eq!(plan.count, 0);
        prop_assert_eq!(plan.bounds(0), 0..plan.length);
    }

    let chunks: Vec<&str> = (0..plan.count.max(1))
        .map(|index| plan.chunk_text(text, index))
        .collect();
    if plan.is_multipart() {
        prop_assert!(chunks.iter().all(|chunk| !chunk.is_empty()), "empty chunk in {:?}", chunks);
    }
    prop_assert_eq!(chunks.concat(), text);
    Ok(plan)
}

fn check_encodes(text: &str, plan: ChunkPlan) -> Result<(), TestCaseError> {
    let mut message = OutboundMessage::new("+33612345678", text, plan, 300);
    let mut codec = Pdu::default();
    codec.set_service_center("+33609001390");
    let mut decoded: String = String::new();
    while let Some(chunk) = message.next_chunk() {
        if let Some(Multipart { count, index, .. }) = chunk.multipart {
            prop_assert_eq!(usize::from(count), plan.count);
            prop_assert!(index >= 1 && index <= count);
        }
        let encoded = codec.encode("+33612345678", &chunk.text, chunk.multipart);
        prop_assert!(encoded.is_ok(), "chunk {:?} refused: {:?}", chunk.text, encoded);
        let payload: String = codec.payload().to_string();
        let sms = codec.decode(&payload).unwrap();
        prop_assert_eq!(sms.sender.as_str(), "+33612345678");
        decoded.push_str(&sms.text);
    }
    prop_assert_eq!(decoded, text);
    Ok(())
}

proptest! {
    #[test]
    fn gsm7_chunks_cover_text_and_encode(text in gsm7_text()) {
        let plan = check_plan(&text)?;
        prop_assert_eq!(plan.encoding, Encoding::SevenBit);
        check_encodes(&text, plan)?;
    }

    #[test]
    fn mixed_chunks_cover_text_and_encode(text in mixed_text()) {
        let plan = check_plan(&text)?;
        if plan.encoding == Encoding::SixteenBit {
            prop_assert_eq!(plan.length, text.encode_utf16().count() * 2);
        }
        check_encodes(&text, plan)?;
    }

    #[test]
    fn escape_pairs_near_boundaries_encode(prefix in 140usize..320, tail in 0usize..4) {
        let text: String = format!("{}€{}", "a".repeat(prefix), "b".repeat(tail));
        let plan = check_plan(&text)?;
        check_encodes(&text, plan)?;
    }

    #[test]
    fn chunk_count_matches_length(length in 0usize..2000) {
        for encoding in [Encoding::SevenBit, Encoding::SixteenBit] {
            let plan = ChunkPlan::for_length(encoding, length);
            let covered: usize = (0..plan.count.max(1)).map(|index| plan.bounds(index).len()).sum();
            prop_assert_eq!(covered, length);
        }
    }
}
