use pianola_domain_score::{
    convert_musicxml_path, convert_musicxml_str, AnimationData, ConvertError, ConvertOptions,
    Hand, ScoreHints,
};
use pretty_assertions::assert_eq;
use std::io::Write;

fn convert(xml: &str) -> AnimationData {
    convert_musicxml_str(xml, &ScoreHints::default(), &ConvertOptions::default())
        .expect("convert ok")
}

fn starts(data: &AnimationData) -> Vec<(u8, f64, f64, Hand)> {
    data.notes
        .iter()
        .map(|n| (n.key_number, n.start_time, n.duration, n.hand))
        .collect()
}

const TWO_HANDS: &str = r#"
<score-partwise version="3.1">
  <work><work-title>Minuet</work-title></work>
  <identification><creator type="composer">Petzold</creator></identification>
  <part-list>
    <score-part id="P1"><part-name>Right</part-name></score-part>
    <score-part id="P2"><part-name>Left</part-name></score-part>
  </part-list>
  <part id="P1">
    <measure number="1">
      <attributes>
        <divisions>1</divisions>
        <key><fifths>1</fifths></key>
        <time><beats>3</beats><beat-type>4</beat-type></time>
      </attributes>
      <direction><direction-type><metronome><beat-unit>quarter</beat-unit><per-minute>96.7</per-minute></metronome></direction-type></direction>
      <note><pitch><step>D</step><octave>5</octave></pitch><duration>2</duration></note>
      <note><pitch><step>G</step><octave>4</octave></pitch><duration>1</duration></note>
    </measure>
    <measure number="2">
      <note><pitch><step>A</step><octave>4</octave></pitch><duration>1</duration></note>
    </measure>
  </part>
  <part id="P2">
    <measure number="1">
      <note><pitch><step>G</step><octave>3</octave></pitch><duration>2</duration></note>
      <note><pitch><step>A</step><octave>3</octave></pitch><duration>1</duration></note>
    </measure>
  </part>
</score-partwise>
"#;

#[test]
fn two_quarter_notes_in_one_part() {
    let xml = r#"
<score-partwise version="3.1">
  <part id="P1">
    <measure number="1">
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>1</duration></note>
    </measure>
  </part>
</score-partwise>
"#;
    let data = convert(xml);
    assert_eq!(
        starts(&data),
        vec![(60, 0.0, 0.25, Hand::Right), (62, 0.25, 0.25, Hand::Right)]
    );
    assert_eq!(data.duration, 0.5);
}

#[test]
fn empty_score_uses_defaults() {
    let data = convert("<score-partwise version=\"3.1\"/>");
    assert!(data.notes.is_empty());
    assert_eq!(data.duration, 0.0);
    assert_eq!(data.tempo, 120);
    assert_eq!(data.key_signature, "C");
    assert_eq!(data.time_signature, "4/4");
    assert_eq!(data.metadata.title, "Untitled");
    assert_eq!(data.metadata.composer, "Unknown");
}

#[test]
fn hands_interleave_and_first_part_wins_ties() {
    let data = convert(TWO_HANDS);
    assert_eq!(
        starts(&data),
        vec![
            (74, 0.0, 0.5, Hand::Right),
            (55, 0.0, 0.5, Hand::Left),
            (67, 0.5, 0.25, Hand::Right),
            (57, 0.5, 0.25, Hand::Left),
            (69, 0.75, 0.25, Hand::Right),
        ]
    );
    assert_eq!(data.duration, 1.0);
}

#[test]
fn derived_fields_come_from_first_markings() {
    let data = convert(TWO_HANDS);
    assert_eq!(data.metadata.title, "Minuet");
    assert_eq!(data.metadata.composer, "Petzold");
    assert_eq!(data.tempo, 96);
    assert_eq!(data.key_signature, "G");
    assert_eq!(data.time_signature, "3/4");
}

#[test]
fn every_part_after_the_first_is_left_hand() {
    let xml = r#"
<score-partwise>
  <part id="P1"><measure><note><pitch><step>C</step><octave>5</octave></pitch></note></measure></part>
  <part id="P2"><measure><note><pitch><step>C</step><octave>3</octave></pitch></note></measure></part>
  <part id="P3"><measure><note><pitch><step>C</step><octave>2</octave></pitch></note></measure></part>
</score-partwise>
"#;
    let hands: Vec<Hand> = convert(xml).notes.iter().map(|n| n.hand).collect();
    assert_eq!(hands, vec![Hand::Right, Hand::Left, Hand::Left]);
}

#[test]
fn cursor_carries_across_measures() {
    let xml = r#"
<score-partwise>
  <part id="P1">
    <measure number="1"><note><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration></note></measure>
    <measure number="2"><note><pitch><step>E</step><octave>4</octave></pitch><duration>4</duration></note></measure>
  </part>
</score-partwise>
"#;
    let data = convert(xml);
    let times: Vec<f64> = data.notes.iter().map(|n| n.start_time).collect();
    assert_eq!(times, vec![0.0, 1.0]);
}

#[test]
fn rests_do_not_move_the_cursor_by_default() {
    let xml = r#"
<score-partwise>
  <part id="P1">
    <measure>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration></note>
      <note><rest/><duration>2</duration></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>1</duration></note>
    </measure>
  </part>
</score-partwise>
"#;
    let data = convert(xml);
    let times: Vec<f64> = data.notes.iter().map(|n| n.start_time).collect();
    assert_eq!(times, vec![0.0, 0.25]);

    let advancing = convert_musicxml_str(
        xml,
        &ScoreHints::default(),
        &ConvertOptions {
            rest_advances_cursor: true,
        },
    )
    .expect("convert ok");
    let times: Vec<f64> = advancing.notes.iter().map(|n| n.start_time).collect();
    assert_eq!(times, vec![0.0, 0.75]);
}

#[test]
fn dropped_notes_leave_cursor_untouched() {
    let xml = r#"
<score-partwise>
  <part id="P1">
    <measure>
      <note><pitch><step>C</step><octave>0</octave></pitch><duration>4</duration></note>
      <note><pitch><step>C</step><octave>-1</octave></pitch><duration>4</duration></note>
      <note><pitch><step>X</step><octave>4</octave></pitch><duration>4</duration></note>
      <note><duration>4</duration></note>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>oops</duration></note>
      <note><pitch><step>A</step><octave>0</octave></pitch><duration>1</duration></note>
      <note><pitch><step>C</step><octave>8</octave></pitch><duration>1</duration></note>
    </measure>
  </part>
</score-partwise>
"#;
    let data = convert(xml);
    assert_eq!(
        starts(&data),
        vec![(21, 0.0, 0.25, Hand::Right), (108, 0.25, 0.25, Hand::Right)]
    );
}

#[test]
fn fingering_is_optional_and_range_checked() {
    let xml = r#"
<score-partwise>
  <part id="P1">
    <measure>
      <note><pitch><step>C</step><octave>4</octave></pitch><notations><technical><fingering>1</fingering></technical></notations></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><notations><technical><fingering>0</fingering></technical></notations></note>
      <note><pitch><step>E</step><octave>4</octave></pitch><notations><technical><fingering>6</fingering></technical></notations></note>
      <note><pitch><step>F</step><octave>4</octave></pitch><notations><technical><fingering>thumb</fingering></technical></notations></note>
      <note><pitch><step>G</step><octave>4</octave></pitch></note>
    </measure>
  </part>
</score-partwise>
"#;
    let fingers: Vec<Option<u8>> = convert(xml).notes.iter().map(|n| n.finger).collect();
    assert_eq!(fingers, vec![Some(1), None, None, None, None]);
}

#[test]
fn hints_fill_missing_metadata_only() {
    let hints = ScoreHints::new(Some("From Upload".into()), Some("Caller".into()));
    let bare = convert_musicxml_str("<score-partwise/>", &hints, &ConvertOptions::default())
        .expect("convert ok");
    assert_eq!(bare.metadata.title, "From Upload");
    assert_eq!(bare.metadata.composer, "Caller");

    let declared = convert_musicxml_str(TWO_HANDS, &hints, &ConvertOptions::default())
        .expect("convert ok");
    assert_eq!(declared.metadata.title, "Minuet");
    assert_eq!(declared.metadata.composer, "Petzold");
}

#[test]
fn blank_title_and_other_creators_are_ignored() {
    let xml = r#"
<score-partwise>
  <work><work-title>   </work-title></work>
  <identification>
    <creator type="lyricist">Someone</creator>
    <creator type="composer">  Bach  </creator>
  </identification>
</score-partwise>
"#;
    let hints = ScoreHints::new(Some(String::new()), None);
    let data = convert_musicxml_str(xml, &hints, &ConvertOptions::default()).expect("convert ok");
    assert_eq!(data.metadata.title, "Untitled");
    assert_eq!(data.metadata.composer, "Bach");
}

#[test]
fn flat_and_unknown_keys_fall_back_to_c() {
    for (fifths, expected) in [("-3", "C"), ("7", "C#"), ("8", "C"), ("two", "C"), ("6", "F#")] {
        let xml = format!(
            "<score-partwise><part><measure><attributes><key><fifths>{fifths}</fifths></key></attributes></measure></part></score-partwise>"
        );
        assert_eq!(convert(&xml).key_signature, expected, "fifths {fifths}");
    }
}

#[test]
fn unparsable_tempo_defaults_to_120() {
    let xml = "<score-partwise><part><measure><direction><direction-type><metronome><per-minute>fast</per-minute></metronome></direction-type></direction></measure></part></score-partwise>";
    assert_eq!(convert(xml).tempo, 120);
}

#[test]
fn out_of_range_tempo_defaults_to_120() {
    for mark in ["1e30", "-90", "0.5", "inf", "NaN"] {
        let xml = format!(
            "<score-partwise><part><measure><direction><direction-type><metronome><per-minute>{mark}</per-minute></metronome></direction-type></direction></measure></part></score-partwise>"
        );
        assert_eq!(convert(&xml).tempo, 120, "per-minute {mark}");
    }
}

#[test]
fn only_the_first_time_element_counts() {
    let xml = r#"
<score-partwise><part>
  <measure><attributes><time><senza-misura/></time></attributes></measure>
  <measure><attributes><time><beats>6</beats><beat-type>8</beat-type></time></attributes></measure>
</part></score-partwise>
"#;
    assert_eq!(convert(xml).time_signature, "4/4");
}

#[test]
fn output_is_sorted_by_start() {
    let data = convert(TWO_HANDS);
    assert!(data
        .notes
        .windows(2)
        .all(|pair| pair[0].start_time <= pair[1].start_time));
}

#[test]
fn unparsable_document_is_malformed() {
    let err = convert_musicxml_str(
        "<score-partwise><part>",
        &ScoreHints::default(),
        &ConvertOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ConvertError::MalformedScore(_)));
}

#[test]
fn reads_plain_and_compressed_files() {
    let dir = tempfile::tempdir().expect("tempdir");

    let xml_path = dir.path().join("score.xml");
    std::fs::write(&xml_path, TWO_HANDS).expect("write xml");
    let plain = convert_musicxml_path(&xml_path, &ScoreHints::default(), &ConvertOptions::default())
        .expect("plain ok");
    assert_eq!(plain.notes.len(), 5);

    let mxl_path = dir.path().join("score.mxl");
    let file = std::fs::File::create(&mxl_path).expect("create mxl");
    let mut zip = zip::ZipWriter::new(file);
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    zip.start_file("META-INF/container.xml", options).expect("start container");
    zip.write_all(
        br#"<container><rootfiles><rootfile full-path="score/minuet.xml"/></rootfiles></container>"#,
    )
    .expect("write container");
    zip.start_file("score/minuet.xml", options).expect("start score");
    zip.write_all(TWO_HANDS.as_bytes()).expect("write score");
    zip.finish().expect("finish zip");

    let compressed =
        convert_musicxml_path(&mxl_path, &ScoreHints::default(), &ConvertOptions::default())
            .expect("mxl ok");
    assert_eq!(starts(&compressed), starts(&plain));
}

#[test]
fn missing_file_is_io_error() {
    let err = convert_musicxml_path(
        std::path::Path::new("/nonexistent/score.xml"),
        &ScoreHints::default(),
        &ConvertOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ConvertError::Io(_)));
}
