//! TwiML response builder
//!
//! Renders the small subset of TwiML the hostess uses: `Say`, `Gather`
//! (speech input), `Pause`, `Connect`/`Stream` and `Hangup`. Text is
//! XML-escaped; verbs render in the order they were added, which is the
//! order Twilio executes them.

use std::fmt::Write as _;

/// One TwiML verb
#[derive(Debug, Clone, PartialEq, Eq)]
enum Verb {
    Say(String),
    Gather { action: String, prompt: String },
    Pause { length: u32 },
    ConnectStream {
        url: String,
        parameters: Vec<(String, String)>,
    },
    Hangup,
}

/// Builder for a `<Response>` document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Speak text to the caller
    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say(text.into()));
        self
    }

    /// Gather the caller's next spoken utterance. Twilio transcribes and
    /// posts the result to `action`; verbs added after the gather run
    /// only if the gather times out without input.
    pub fn gather(mut self, action: impl Into<String>, prompt: impl Into<String>) -> Self {
        self.verbs.push(Verb::Gather {
            action: action.into(),
            prompt: prompt.into(),
        });
        self
    }

    /// Pause for `length` seconds
    pub fn pause(mut self, length: u32) -> Self {
        self.verbs.push(Verb::Pause { length });
        self
    }

    /// Open a bidirectional media stream to `url`
    pub fn connect_stream(self, url: impl Into<String>) -> Self {
        self.connect_stream_with(url, Vec::new())
    }

    /// Open a media stream with custom parameters. Twilio echoes each
    /// parameter back in the stream's `start` event, which is how
    /// call-scoped data like the caller number crosses the WebSocket.
    pub fn connect_stream_with(
        mut self,
        url: impl Into<String>,
        parameters: Vec<(String, String)>,
    ) -> Self {
        self.verbs.push(Verb::ConnectStream {
            url: url.into(),
            parameters,
        });
        self
    }

    /// Hang up the call
    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    /// Render the response document
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>");
        for verb in &self.verbs {
            match verb {
                Verb::Say(text) => {
                    let _ = write!(xml, "<Say>{}</Say>", escape(text));
                }
                Verb::Gather { action, prompt } => {
                    let _ = write!(
                        xml,
                        "<Gather input=\"speech\" speechTimeout=\"auto\" action=\"{}\" \
                         method=\"POST\" language=\"en-US\"><Say>{}</Say></Gather>",
                        escape(action),
                        escape(prompt)
                    );
                }
                Verb::Pause { length } => {
                    let _ = write!(xml, "<Pause length=\"{}\"/>", length);
                }
                Verb::ConnectStream { url, parameters } => {
                    if parameters.is_empty() {
                        let _ = write!(
                            xml,
                            "<Connect><Stream url=\"{}\"/></Connect>",
                            escape(url)
                        );
                    } else {
                        let _ = write!(xml, "<Connect><Stream url=\"{}\">", escape(url));
                        for (name, value) in parameters {
                            let _ = write!(
                                xml,
                                "<Parameter name=\"{}\" value=\"{}\"/>",
                                escape(name),
                                escape(value)
                            );
                        }
                        xml.push_str("</Stream></Connect>");
                    }
                }
                Verb::Hangup => xml.push_str("<Hangup/>"),
            }
        }
        xml.push_str("</Response>");
        xml
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_say_and_hangup() {
        let xml = VoiceResponse::new().say("Goodbye.").hangup().to_xml();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>\
             <Say>Goodbye.</Say><Hangup/></Response>"
        );
    }

    #[test]
    fn test_gather_wraps_prompt() {
        let xml = VoiceResponse::new()
            .gather("/process-speech", "How may I assist?")
            .say("I did not receive any input. Goodbye.")
            .hangup()
            .to_xml();
        assert!(xml.contains("<Gather input=\"speech\" speechTimeout=\"auto\" action=\"/process-speech\""));
        assert!(xml.contains("<Say>How may I assist?</Say></Gather>"));
        // fallback verbs come after the gather
        let gather_end = xml.find("</Gather>").unwrap();
        let fallback = xml.find("I did not receive any input").unwrap();
        assert!(fallback > gather_end);
    }

    #[test]
    fn test_connect_stream() {
        let xml = VoiceResponse::new()
            .say("Welcome.")
            .pause(1)
            .connect_stream("wss://example.com/media-stream")
            .to_xml();
        assert!(xml.contains("<Pause length=\"1\"/>"));
        assert!(xml.contains("<Connect><Stream url=\"wss://example.com/media-stream\"/></Connect>"));
    }

    #[test]
    fn test_connect_stream_with_parameters() {
        let xml = VoiceResponse::new()
            .connect_stream_with(
                "wss://example.com/media-stream",
                vec![("caller".to_string(), "+15551234567".to_string())],
            )
            .to_xml();
        assert!(xml.contains(
            "<Connect><Stream url=\"wss://example.com/media-stream\">\
             <Parameter name=\"caller\" value=\"+15551234567\"/></Stream></Connect>"
        ));
    }

    #[test]
    fn test_text_is_escaped() {
        let xml = VoiceResponse::new().say("Fish & Chips <today>").to_xml();
        assert!(xml.contains("<Say>Fish &amp; Chips &lt;today&gt;</Say>"));
    }
}
