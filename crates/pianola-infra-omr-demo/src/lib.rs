//! Stand-in OMR engine that ignores the PDF contents and writes a fixed
//! C major scale. Lets the service run end to end without Audiveris.

use pianola_ports::omr::{OmrError, OmrOptions, OmrPort, OmrResult};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::Duration;

const OUTPUT_FILE: &str = "output.xml";

/// (step, octave, finger) for the two demo measures.
const SCALE: [[(&str, i32, u8); 4]; 2] = [
    [("C", 4, 1), ("D", 4, 2), ("E", 4, 3), ("F", 4, 4)],
    [("G", 4, 5), ("A", 4, 4), ("B", 4, 3), ("C", 5, 5)],
];

#[derive(Clone, Debug, Default)]
pub struct DemoOmr {
    delay: Duration,
}

impl DemoOmr {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn demo_musicxml(file_name: &str) -> String {
        let mut measures = String::new();
        for (index, notes) in SCALE.iter().enumerate() {
            let _ = writeln!(measures, "    <measure number=\"{}\">", index + 1);
            if index == 0 {
                measures.push_str(
                    "      <attributes>\n\
                     \x20       <divisions>1</divisions>\n\
                     \x20       <key><fifths>0</fifths></key>\n\
                     \x20       <time><beats>4</beats><beat-type>4</beat-type></time>\n\
                     \x20       <clef><sign>G</sign><line>2</line></clef>\n\
                     \x20     </attributes>\n",
                );
            }
            for (step, octave, finger) in notes {
                let _ = writeln!(
                    measures,
                    "      <note>\n\
                     \x20       <pitch><step>{step}</step><octave>{octave}</octave></pitch>\n\
                     \x20       <duration>1</duration>\n\
                     \x20       <type>quarter</type>\n\
                     \x20       <notations><technical><fingering>{finger}</fingering></technical></notations>\n\
                     \x20     </note>"
                );
            }
            measures.push_str("    </measure>\n");
        }

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 3.1 Partwise//EN"
    "http://www.musicxml.org/dtds/partwise.dtd">
<score-partwise version="3.1">
  <work>
    <work-title>Demo: {title}</work-title>
  </work>
  <identification>
    <creator type="composer">Demo Composer</creator>
    <encoding>
      <software>pianola demo OMR</software>
      <encoding-date>{date}</encoding-date>
    </encoding>
  </identification>
  <part-list>
    <score-part id="P1">
      <part-name>Piano</part-name>
    </score-part>
  </part-list>
  <part id="P1">
{measures}  </part>
</score-partwise>
"#,
            title = escape_xml(file_name),
            date = chrono::Utc::now().format("%Y-%m-%d"),
        )
    }
}

impl OmrPort for DemoOmr {
    fn recognize_pdf(
        &self,
        pdf_path: &Path,
        output_dir: &Path,
        _options: &OmrOptions,
    ) -> Result<OmrResult, OmrError> {
        let file_name = pdf_path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| OmrError::UnsupportedFormat("invalid pdf filename".to_string()))?;
        tracing::info!(pdf = %pdf_path.display(), "generating demo MusicXML");

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        fs::create_dir_all(output_dir).map_err(|e| OmrError::Backend(e.to_string()))?;
        let musicxml_path = output_dir.join(OUTPUT_FILE);
        fs::write(&musicxml_path, Self::demo_musicxml(file_name))
            .map_err(|e| OmrError::Backend(e.to_string()))?;

        Ok(OmrResult {
            musicxml_path,
            diagnostics_path: None,
        })
    }

    fn check_installation(&self) -> Result<(), OmrError> {
        Ok(())
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
