//! Prompt assembly for chat answers and lesson plans

use crate::retrieval::ScoredParent;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How much of the assembled context the sync endpoints echo back
const CONTEXT_PREVIEW_CHARS: usize = 200;

pub const CHAT_SYSTEM_PROMPT: &str = "你是一名思政课教学助手。请严格依据提供的参考资料回答学生的问题：\
资料中有依据的内容要准确引用，资料未覆盖的部分可以结合学科常识补充，但必须明确区分。\
回答应当条理清晰、语言规范，符合思政课教学的表述要求。";

pub const LESSON_SYSTEM_PROMPT: &str = "你是一名思政课教学设计专家。请依据提供的参考资料，\
为指定学段设计一份完整的45分钟课堂教学设计，包含教学目标、教学重难点、\
教学过程（导入、讲授、讨论、总结，注明各环节时间分配）和课后作业。\
教学内容要贴合学段认知水平，理论表述以参考资料为准。";

/// Target学段 for lesson plan generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "小学")]
    Primary,
    #[serde(rename = "初中")]
    MiddleSchool,
    #[serde(rename = "高中")]
    HighSchool,
    #[serde(rename = "大学")]
    Undergraduate,
    #[serde(rename = "硕士")]
    Master,
    #[serde(rename = "博士")]
    Doctoral,
    #[default]
    #[serde(rename = "通用")]
    General,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Grade::Primary => "小学",
            Grade::MiddleSchool => "初中",
            Grade::HighSchool => "高中",
            Grade::Undergraduate => "大学",
            Grade::Master => "硕士",
            Grade::Doctoral => "博士",
            Grade::General => "通用",
        };
        f.write_str(label)
    }
}

/// Join retrieved parent chunks into the reference block, each tagged with
/// its source document
pub fn context_text(parents: &[ScoredParent]) -> String {
    parents
        .iter()
        .map(|p| format!("[来源: {}]\n{}", p.chunk.source, p.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn chat_user_prompt(query: &str, context: &str) -> String {
    if context.is_empty() {
        format!("（本次未检索到相关参考资料，请基于学科常识谨慎回答，并说明资料不足。）\n\n问题：{}", query)
    } else {
        format!("参考资料：\n{}\n\n问题：{}", context, query)
    }
}

pub fn lesson_user_prompt(topic: &str, grade: Grade, context: &str) -> String {
    if context.is_empty() {
        format!(
            "请以《{}》为主题，为【{}】学段设计一份完整的教学设计。本次未检索到参考资料，请基于学科常识设计并注明。",
            topic, grade
        )
    } else {
        format!(
            "参考资料：\n{}\n\n请以《{}》为主题，为【{}】学段设计一份完整的教学设计。",
            context, topic, grade
        )
    }
}

/// Truncated context echo for the non-streaming endpoints
pub fn context_preview(context: &str) -> String {
    let mut preview: String = context.chars().take(CONTEXT_PREVIEW_CHARS).collect();
    if context.chars().count() > CONTEXT_PREVIEW_CHARS {
        preview.push('…');
    }
    preview
}
