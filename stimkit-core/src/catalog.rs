//! Ready-made display configurations. Base constructors define the full
//! parameter set; derived ones call their base and reassign what differs.

use crate::display::{Display, DisplayKind};
use crate::param::ParamValue;
use crate::topic::Topics;
use anyhow::Result;

/// White field switching against a black background.
pub fn white_switching() -> Result<Display> {
    let mut d = Display::new("White Switching", Topics::DISPLAY_TEST, DisplayKind::Switching);
    d.params
        .define("FieldColor", ParamValue::Color([255, 255, 255, 255]))?;
    d.params
        .define("BackgroundColor", ParamValue::Color([0, 0, 0, 255]))?;
    d.params.define("OnDuration", ParamValue::Integer(500))?;
    d.params.define("OffDuration", ParamValue::Integer(500))?;
    Ok(d)
}

/// The inverse switching test: black field against a white background.
pub fn black_switching() -> Result<Display> {
    let mut d = white_switching()?;
    d.title = "Black Switching".to_string();
    d.params
        .assign("FieldColor", ParamValue::Color([0, 0, 0, 255]))?;
    d.params
        .assign("BackgroundColor", ParamValue::Color([255, 255, 255, 255]))?;
    Ok(d)
}

/// Clears the viewport to black.
pub fn clear_screen() -> Result<Display> {
    let mut d = Display::new("Clear Screen", Topics::CLEAR, DisplayKind::FillScreen);
    d.params.define("Color", ParamValue::Color([0, 0, 0, 255]))?;
    Ok(d)
}

/// Fills the viewport with a configurable color.
pub fn fill_screen() -> Result<Display> {
    let mut d = clear_screen()?;
    d.title = "Fill Screen".to_string();
    d.params
        .assign("Color", ParamValue::Color([128, 128, 128, 255]))?;
    Ok(d)
}

/// A wrapped block of text.
pub fn text_paragraph() -> Result<Display> {
    let mut d = Display::new("Text Paragraph", Topics::INTRO, DisplayKind::TextParagraph);
    d.params.define("Text", ParamValue::Text(String::new()))?;
    d.params.define("FontSize", ParamValue::Number(24.0))?;
    d.params.define("WrapFraction", ParamValue::Number(0.6))?;
    Ok(d)
}

/// Instruction page shown until the participant responds.
pub fn instruction() -> Result<Display> {
    let mut d = text_paragraph()?;
    d.title = "Instruction".to_string();
    d.params.assign(
        "Text",
        ParamValue::Text("Press SPACE to continue.".to_string()),
    )?;
    d.params.assign("FontSize", ParamValue::Number(28.0))?;
    d.params.assign("WrapFraction", ParamValue::Number(0.75))?;
    Ok(d)
}

/// Playback-device control display.
pub fn media_player() -> Result<Display> {
    let mut d = Display::new("Media Player", Topics::MEDIA, DisplayKind::MediaControl);
    d.params
        .define("Command", ParamValue::Text("start".to_string()))?;
    Ok(d)
}

/// Opens the playback device.
pub fn media_player_open() -> Result<Display> {
    let mut d = media_player()?;
    d.title = "Media Player Open".to_string();
    d.params
        .assign("Command", ParamValue::Text("open".to_string()))?;
    Ok(d)
}

/// One centered line of text, up for a fixed duration.
pub fn message() -> Result<Display> {
    let mut d = Display::new("Message", Topics::MESSAGE, DisplayKind::Message);
    d.params.define("Text", ParamValue::Text("OK".to_string()))?;
    d.params.define("FontSize", ParamValue::Number(32.0))?;
    Ok(d)
}

/// Per-trial progress message. The counter reference is expanded against
/// the queue's runtime parameters at show time.
pub fn trial_message() -> Result<Display> {
    let mut d = message()?;
    d.title = "Trial Message".to_string();
    d.topics = Topics::MESSAGE | Topics::EXPERIMENT;
    d.params
        .assign("Text", ParamValue::Text("Trial %TrialCounter%".to_string()))?;
    Ok(d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::policy::TimerPolicy;

    fn all() -> Vec<Display> {
        vec![
            white_switching().unwrap(),
            black_switching().unwrap(),
            clear_screen().unwrap(),
            fill_screen().unwrap(),
            text_paragraph().unwrap(),
            instruction().unwrap(),
            media_player().unwrap(),
            media_player_open().unwrap(),
            message().unwrap(),
            trial_message().unwrap(),
        ]
    }

    #[test]
    fn every_display_is_titled_and_tagged() {
        for d in all() {
            assert!(!d.title.is_empty());
            assert!(!d.topics.is_empty(), "{} has no topics", d.title);
            d.validate().unwrap();
        }
    }

    #[test]
    fn every_display_creates_against_a_viewport() {
        for mut d in all() {
            d.create((800, 600)).unwrap();
            assert!(!d.elements.is_empty(), "{} created no elements", d.title);
        }
    }

    #[test]
    fn fill_screen_creates_one_bar_with_no_timer() {
        let mut d = fill_screen().unwrap();
        let handle = d.create((800, 600)).unwrap();
        assert_eq!(handle.0, 0);
        assert_eq!(d.elements.len(), 1);
        assert!(matches!(
            d.elements[0],
            Element::Bar {
                x: 0.0,
                y: 0.0,
                width: 800.0,
                height: 600.0,
                ..
            }
        ));
        assert_eq!(d.timing(), TimerPolicy::NoTimer);
    }

    #[test]
    fn trial_message_default_text_is_counter_reference() {
        let d = trial_message().unwrap();
        assert_eq!(d.params.text("Text").unwrap(), "Trial %TrialCounter%");
        assert!(d.timing().deadline_ms().is_some());
    }

    #[test]
    fn black_switching_inverts_white_switching() {
        let white = white_switching().unwrap();
        let black = black_switching().unwrap();
        assert_eq!(
            white.params.color("FieldColor").unwrap(),
            black.params.color("BackgroundColor").unwrap()
        );
        assert_eq!(
            white.params.color("BackgroundColor").unwrap(),
            black.params.color("FieldColor").unwrap()
        );
        assert_eq!(white.kind, black.kind);
    }

    #[test]
    fn media_player_open_issues_open() {
        let mut d = media_player_open().unwrap();
        d.create((640, 480)).unwrap();
        assert!(matches!(
            d.elements[0],
            Element::Command {
                command: crate::element::MediaCommand::Open
            }
        ));
    }

    #[test]
    fn instruction_waits_for_release() {
        let mut d = instruction().unwrap();
        d.create((800, 600)).unwrap();
        assert_eq!(d.timing(), TimerPolicy::ReleaseResponse);
    }
}
