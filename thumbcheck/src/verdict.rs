//! Rule-based verdicts on the dominant color and the recognized text

use strum::{EnumIter, IntoStaticStr};

use crate::color::DominantColor;

/// Mean channel value below which a color is too dark.
pub const DARK_BRIGHTNESS: u16 = 80;
/// Mean channel value above which a color is too light.
pub const LIGHT_BRIGHTNESS: u16 = 200;
/// More characters than this is too much text for a thumbnail.
pub const MAX_TEXT_CHARS: usize = 30;

/// A closed-set classification with a user-facing message.
pub trait Verdict: Copy + Into<&'static str> {
    fn message(&self) -> &'static str;

    fn label(&self) -> &'static str {
        (*self).into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, EnumIter)]
pub enum ColorVerdict {
    TooDark,
    TooLight,
    Balanced,
}

impl Verdict for ColorVerdict {
    fn message(&self) -> &'static str {
        match self {
            ColorVerdict::TooDark => "Very dark color, it might not stand out.",
            ColorVerdict::TooLight => "Very light color, watch the contrast.",
            ColorVerdict::Balanced => "Balanced color.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, EnumIter)]
pub enum TextVerdict {
    NoTextDetected,
    TooMuchText,
    ReasonableAmount,
}

impl Verdict for TextVerdict {
    fn message(&self) -> &'static str {
        match self {
            TextVerdict::NoTextDetected => "No text detected.",
            TextVerdict::TooMuchText => "A lot of text detected, it could clutter the thumbnail.",
            TextVerdict::ReasonableAmount => "Reasonable amount of text.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, EnumIter)]
pub enum Conclusion {
    LooksGood,
    ReviewBothColorAndText,
    AdjustColors,
    ReduceText,
}

impl Verdict for Conclusion {
    fn message(&self) -> &'static str {
        match self {
            Conclusion::LooksGood => "The thumbnail looks pretty good!",
            Conclusion::ReviewBothColorAndText => "Review both the colors and the text.",
            Conclusion::AdjustColors => "Adjust the colors a bit.",
            Conclusion::ReduceText => "You could reduce the amount of text.",
        }
    }
}

macro_rules! display_message {
    ($($ty:ty),*) => {
        $(impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.message())
            }
        })*
    };
}

display_message!(ColorVerdict, TextVerdict, Conclusion);

/// Classify by brightness, the mean of R, G and B. Both bounds are exclusive.
pub fn evaluate_color(color: DominantColor) -> ColorVerdict {
    // compare sums to avoid dividing by 3
    let sum = color.channel_sum();
    if sum < DARK_BRIGHTNESS * 3 {
        ColorVerdict::TooDark
    } else if sum > LIGHT_BRIGHTNESS * 3 {
        ColorVerdict::TooLight
    } else {
        ColorVerdict::Balanced
    }
}

pub fn evaluate_text(text: &str) -> TextVerdict {
    if text.is_empty() {
        TextVerdict::NoTextDetected
    } else if text.chars().count() > MAX_TEXT_CHARS {
        TextVerdict::TooMuchText
    } else {
        TextVerdict::ReasonableAmount
    }
}

/// Missing text is never penalized: only `TooMuchText` counts against the text.
pub fn final_conclusion(color: ColorVerdict, text: TextVerdict) -> Conclusion {
    let color_ok = color == ColorVerdict::Balanced;
    let text_ok = text != TextVerdict::TooMuchText;

    match (color_ok, text_ok) {
        (true, true) => Conclusion::LooksGood,
        (false, false) => Conclusion::ReviewBothColorAndText,
        (false, true) => Conclusion::AdjustColors,
        (true, false) => Conclusion::ReduceText,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn gray(v: u8) -> DominantColor {
        DominantColor::new(v, v, v)
    }

    #[test]
    fn color_thresholds_are_strict() {
        assert_eq!(evaluate_color(gray(0)), ColorVerdict::TooDark);
        assert_eq!(evaluate_color(gray(79)), ColorVerdict::TooDark);
        assert_eq!(evaluate_color(gray(80)), ColorVerdict::Balanced);
        assert_eq!(evaluate_color(gray(200)), ColorVerdict::Balanced);
        assert_eq!(evaluate_color(gray(201)), ColorVerdict::TooLight);
        assert_eq!(evaluate_color(gray(255)), ColorVerdict::TooLight);
    }

    #[test]
    fn color_uses_the_channel_mean() {
        // mean 79.67
        assert_eq!(evaluate_color(DominantColor::new(80, 80, 79)), ColorVerdict::TooDark);
        // mean exactly 80
        assert_eq!(evaluate_color(DominantColor::new(240, 0, 0)), ColorVerdict::Balanced);
        // mean 200.33
        assert_eq!(evaluate_color(DominantColor::new(255, 255, 91)), ColorVerdict::TooLight);
        // mean exactly 200
        assert_eq!(evaluate_color(DominantColor::new(255, 255, 90)), ColorVerdict::Balanced);
    }

    #[test]
    fn every_color_matches_its_brightness() {
        for r in (0..=255u8).step_by(17) {
            for g in (0..=255u8).step_by(17) {
                for b in (0..=255u8).step_by(5) {
                    let color = DominantColor::new(r, g, b);
                    let expected = if color.brightness() < 80.0 {
                        ColorVerdict::TooDark
                    } else if color.brightness() > 200.0 {
                        ColorVerdict::TooLight
                    } else {
                        ColorVerdict::Balanced
                    };
                    assert_eq!(evaluate_color(color), expected, "{color}");
                }
            }
        }
    }

    #[test]
    fn text_amounts() {
        assert_eq!(evaluate_text(""), TextVerdict::NoTextDetected);
        assert_eq!(evaluate_text("A"), TextVerdict::ReasonableAmount);
        assert_eq!(evaluate_text(&"x".repeat(30)), TextVerdict::ReasonableAmount);
        assert_eq!(evaluate_text(&"x".repeat(31)), TextVerdict::TooMuchText);
        assert_eq!(evaluate_text(&"x".repeat(45)), TextVerdict::TooMuchText);
    }

    #[test]
    fn text_length_counts_characters_not_bytes() {
        assert_eq!(evaluate_text(&"é".repeat(30)), TextVerdict::ReasonableAmount);
    }

    #[test]
    fn conclusion_truth_table() {
        use ColorVerdict::*;
        use TextVerdict::*;

        assert_eq!(final_conclusion(Balanced, ReasonableAmount), Conclusion::LooksGood);
        assert_eq!(final_conclusion(Balanced, NoTextDetected), Conclusion::LooksGood);
        assert_eq!(final_conclusion(Balanced, TooMuchText), Conclusion::ReduceText);
        assert_eq!(final_conclusion(TooDark, TooMuchText), Conclusion::ReviewBothColorAndText);
        assert_eq!(final_conclusion(TooLight, TooMuchText), Conclusion::ReviewBothColorAndText);
        assert_eq!(final_conclusion(TooDark, ReasonableAmount), Conclusion::AdjustColors);
        assert_eq!(final_conclusion(TooLight, NoTextDetected), Conclusion::AdjustColors);
    }

    #[test]
    fn labels_and_messages() {
        assert_eq!(ColorVerdict::TooDark.label(), "TooDark");
        assert_eq!(TextVerdict::NoTextDetected.label(), "NoTextDetected");
        assert_eq!(Conclusion::ReduceText.label(), "ReduceText");
        assert_eq!(Conclusion::LooksGood.to_string(), "The thumbnail looks pretty good!");

        let messages: Vec<_> = Conclusion::iter().map(|c| c.message()).collect();
        let mut unique = messages.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(messages.len(), unique.len());
    }
}
