use serde::{Deserialize, Serialize};

/// 报告的目标语言
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum TargetLanguage {
    #[serde(rename = "en")]
    #[default]
    English,
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "fr")]
    French,
}

impl std::fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetLanguage::English => write!(f, "en"),
            TargetLanguage::Chinese => write!(f, "zh"),
            TargetLanguage::Japanese => write!(f, "ja"),
            TargetLanguage::German => write!(f, "de"),
            TargetLanguage::French => write!(f, "fr"),
        }
    }
}

impl std::str::FromStr for TargetLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" | "english" | "英文" => Ok(TargetLanguage::English),
            "zh" | "chinese" | "中文" => Ok(TargetLanguage::Chinese),
            "ja" | "japanese" | "日本語" | "日文" => Ok(TargetLanguage::Japanese),
            "de" | "german" | "deutsch" | "德文" => Ok(TargetLanguage::German),
            "fr" | "french" | "français" | "法文" => Ok(TargetLanguage::French),
            _ => Err(format!("Unknown target language: {}", s)),
        }
    }
}

impl TargetLanguage {
    /// 获取语言的描述性名称
    pub fn display_name(&self) -> &'static str {
        match self {
            TargetLanguage::English => "English",
            TargetLanguage::Chinese => "中文",
            TargetLanguage::Japanese => "日本語",
            TargetLanguage::German => "Deutsch",
            TargetLanguage::French => "Français",
        }
    }

    /// 报告撰写时追加给模型的语言指令
    pub fn report_instruction(&self) -> &'static str {
        match self {
            TargetLanguage::English => {
                "Write the report in English, keeping the language accurate, professional and easy to follow."
            }
            TargetLanguage::Chinese => "请使用中文撰写报告，确保语言表达准确、专业、易于理解。",
            TargetLanguage::Japanese => {
                "日本語でレポートを作成してください。正確で専門的で理解しやすい表現を心がけてください。"
            }
            TargetLanguage::German => {
                "Bitte verfassen Sie den Bericht auf Deutsch, präzise, professionell und leicht verständlich."
            }
            TargetLanguage::French => {
                "Veuillez rédiger le rapport en français, de manière précise, professionnelle et facile à comprendre."
            }
        }
    }

    /// 报告末尾来源列表的标题
    pub fn sources_heading(&self) -> &'static str {
        match self {
            TargetLanguage::English => "Sources",
            TargetLanguage::Chinese => "参考来源",
            TargetLanguage::Japanese => "出典",
            TargetLanguage::German => "Quellen",
            TargetLanguage::French => "Sources",
        }
    }
}
