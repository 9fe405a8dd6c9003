use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::color::DominantColor;
use crate::verdict::{
    evaluate_color, evaluate_text, final_conclusion, ColorVerdict, Conclusion, TextVerdict,
    Verdict,
};

/// Everything one analysis run found out about an image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub dominant_color: DominantColor,
    pub text: String,
    #[serde(serialize_with = "serialize_verdict")]
    pub color_verdict: ColorVerdict,
    #[serde(serialize_with = "serialize_verdict")]
    pub text_verdict: TextVerdict,
    #[serde(serialize_with = "serialize_verdict")]
    pub conclusion: Conclusion,
}

impl AnalysisReport {
    pub fn new(dominant_color: DominantColor, text: String) -> Self {
        let color_verdict = evaluate_color(dominant_color);
        let text_verdict = evaluate_text(&text);
        Self {
            dominant_color,
            text,
            color_verdict,
            text_verdict,
            conclusion: final_conclusion(color_verdict, text_verdict),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl std::fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Dominant color: {}", self.dominant_color)?;
        writeln!(f, "→ {}", self.color_verdict)?;
        writeln!(f)?;
        writeln!(f, "Detected text: \"{}\"", self.text)?;
        writeln!(f, "→ {}", self.text_verdict)?;
        writeln!(f)?;
        write!(f, "Conclusion: {}", self.conclusion)
    }
}

fn serialize_verdict<V: Verdict, S: Serializer>(
    verdict: &V,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut state = serializer.serialize_struct("Verdict", 2)?;
    state.serialize_field("label", verdict.label())?;
    state.serialize_field("message", verdict.message())?;
    state.end()
}
