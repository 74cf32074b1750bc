use lingostream::api::stream::StreamParser;
use lingostream::client::{LineDecoder, ParsedLine, RecordParser};
use lingostream::server::{FrameMode, Framer, FramingStrategy};
use lingostream::types::{Record, Tag};

const RECORDS: &str = concat!(
    r#"{"type":"orig_lang_code","value":"en"}"#,
    r#"{"type":"expression","value":"Hello there."}"#,
    "\n",
    r#"{"type":"main_translation","value":"Bonjour... "}"#,
    r#"{"type":"alternative","value":"Salut"}"#,
    r#"{"type":"alternative","value":42}"#,
);

fn expected_lines() -> Vec<ParsedLine> {
    vec![
        ParsedLine::Language("en".to_string()),
        ParsedLine::Item(Record::new(Tag::Expression, "Hello there")),
        ParsedLine::Item(Record::new(Tag::MainTranslation, "Bonjour")),
        ParsedLine::Item(Record::new(Tag::Alternative, "Salut")),
        ParsedLine::Item(Record::new(Tag::Alternative, 42)),
    ]
}

/// Frame `fragments` server-side, deliver the wire bytes in `read_size`
/// pieces, and parse them client-side.
fn run_pipeline(strategy: FramingStrategy, fragments: &[&str], read_size: usize) -> Vec<ParsedLine> {
    let mut framer = Framer::new(FrameMode::Structured(strategy));
    let wire: String = fragments.iter().flat_map(|f| framer.push(f)).collect();
    // Leftovers never reach the wire.
    framer.finish();

    let mut decoder = LineDecoder::new();
    let mut lines = Vec::new();
    for chunk in wire.as_bytes().chunks(read_size) {
        lines.extend(decoder.process(chunk));
    }
    lines.extend(decoder.finish());

    let mut parser = RecordParser::new();
    lines.iter().filter_map(|line| parser.parse(line)).collect()
}

fn char_boundaries(text: &str) -> Vec<usize> {
    text.char_indices().map(|(i, _)| i).skip(1).collect()
}

#[test]
fn test_output_is_independent_of_fragment_boundaries() {
    for strategy in [FramingStrategy::BraceScan, FramingStrategy::Tokenizer] {
        for split in char_boundaries(RECORDS) {
            let (head, tail) = RECORDS.split_at(split);
            assert_eq!(
                run_pipeline(strategy, &[head, tail], 4096),
                expected_lines(),
                "strategy {strategy:?}, split at {split}"
            );
        }
    }
}

#[test]
fn test_output_is_independent_of_read_size() {
    let pieces: Vec<String> = RECORDS.chars().map(String::from).collect();
    let pieces: Vec<&str> = pieces.iter().map(String::as_str).collect();
    for read_size in [1, 2, 3, 7, 64] {
        assert_eq!(
            run_pipeline(FramingStrategy::Tokenizer, &pieces, read_size),
            expected_lines(),
            "read size {read_size}"
        );
    }
}

#[test]
fn test_multibyte_values_survive_every_read_size() {
    let fragments = [r#"{"type":"main_translation","value":"こんにちは、世界"}"#];
    for read_size in 1..8 {
        assert_eq!(
            run_pipeline(FramingStrategy::Tokenizer, &fragments, read_size),
            vec![ParsedLine::Item(Record::new(Tag::MainTranslation, "こんにちは、世界"))]
        );
    }
}

#[test]
fn test_value_with_close_brace_needs_tokenizer() {
    let fragments = [
        r#"{"type":"expression","value":"{x}"}"#,
        r#"{"type":"alternative","value":"y"}"#,
    ];
    assert!(run_pipeline(FramingStrategy::BraceScan, &fragments, 16).is_empty());
    assert_eq!(
        run_pipeline(FramingStrategy::Tokenizer, &fragments, 16),
        vec![
            ParsedLine::Item(Record::new(Tag::Expression, "{x}")),
            ParsedLine::Item(Record::new(Tag::Alternative, "y")),
        ]
    );
}

#[test]
fn test_terminal_record_stops_the_exchange() {
    let fragments = [
        r#"{"type":"expression","value":"a"}"#,
        r#"{"type":"error","value":"Input is not a language"}"#,
        r#"{"type":"alternative","value":"ignored"}"#,
    ];
    assert_eq!(
        run_pipeline(FramingStrategy::Tokenizer, &fragments, 5),
        vec![
            ParsedLine::Item(Record::new(Tag::Expression, "a")),
            ParsedLine::Terminal("Input is not a language".to_string()),
        ]
    );
}

#[test]
fn test_provider_sse_feeds_framer() {
    let sse = concat!(
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"{\\\"type\\\":\\\"expre\"}]}}]}\n\n",
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"ssion\\\",\\\"value\\\":\\\"Hi.\\\"}\"}]}}]}\n\n",
    );
    let mut parser = StreamParser::new();
    let mut fragments = parser.process(sse.as_bytes()).expect("valid SSE");
    fragments.extend(parser.finish().expect("valid tail"));
    assert_eq!(fragments.len(), 2);

    let fragments: Vec<&str> = fragments.iter().map(String::as_str).collect();
    assert_eq!(
        run_pipeline(FramingStrategy::Tokenizer, &fragments, 3),
        vec![ParsedLine::Item(Record::new(Tag::Expression, "Hi"))]
    );
}

#[test]
fn test_pretty_printed_records_reach_parser_intact() {
    let fragments = [
        "{\n  \"type\": \"main_translation\",\n  \"value\": \"Bon",
        "jour.\"\n}\n{\n  \"type\": \"alternative\",\n  \"value\": \"Salut\"\n}\n",
    ];
    for strategy in [FramingStrategy::BraceScan, FramingStrategy::Tokenizer] {
        for read_size in [1, 5, 4096] {
            assert_eq!(
                run_pipeline(strategy, &fragments, read_size),
                vec![
                    ParsedLine::Item(Record::new(Tag::MainTranslation, "Bonjour")),
                    ParsedLine::Item(Record::new(Tag::Alternative, "Salut")),
                ],
                "strategy {strategy:?}, read size {read_size}"
            );
        }
    }
}
