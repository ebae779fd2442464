//! TwiML rendering for engine directives.

use estate_core::{Directive, RecordSpec};

/// Path Twilio posts the next recording to.
pub const VOICE_ACTION: &str = "/voice";

/// Chained TwiML `<Response>` builder.
#[derive(Debug, Default)]
pub struct TwimlBuilder {
    verbs: Vec<String>,
}

impl TwimlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(mut self, text: &str) -> Self {
        self.verbs.push(format!("<Say>{}</Say>", xml_escape(text)));
        self
    }

    pub fn play(mut self, url: &str) -> Self {
        self.verbs.push(format!("<Play>{}</Play>", xml_escape(url)));
        self
    }

    pub fn record(mut self, spec: RecordSpec, action: &str) -> Self {
        self.verbs.push(format!(
            r#"<Record maxLength="{}" transcribe="{}" playBeep="{}" action="{}"/>"#,
            spec.max_length_secs,
            spec.transcribe,
            spec.play_beep,
            xml_escape(action)
        ));
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push("<Hangup/>".to_string());
        self
    }

    pub fn build(self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><Response>{}</Response>"#,
            self.verbs.concat()
        )
    }
}

/// Public URL a clip is served from.
pub fn clip_url(public_base_url: &str, clip: &str) -> String {
    format!("{}/audio/{}.mp3", public_base_url.trim_end_matches('/'), clip)
}

/// Translate a directive into the TwiML document returned to Twilio.
pub fn render(directive: &Directive, public_base_url: &str) -> String {
    let builder = TwimlBuilder::new();
    let builder = match directive {
        Directive::Prompt(text) | Directive::Fallback(text) => builder.say(text),
        Directive::PlayAudio(handle) => builder.play(&clip_url(public_base_url, handle.as_str())),
        Directive::Terminate(text) => return builder.say(text).hangup().build(),
    };
    builder.record(RecordSpec::STANDARD, VOICE_ACTION).build()
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
