//! Follow-up question screening and categorization
//!
//! Generation rounds keep proposing questions, and left alone the model
//! re-asks what it already asked. Screening compares each candidate against
//! the full cross-round history with token-set similarity; categorization
//! fills in the preference/foundation/priority dimension when the model
//! leaves it out.

use tracing::debug;

use crate::domain::{FollowUpQuestion, QuestionCategory};

/// Token-set Jaccard similarity at or above this marks a near-duplicate
const SIMILARITY_THRESHOLD: f64 = 0.6;

/// Keyword cues for the learning-preference dimension
const PREFERENCE_KEYWORDS: &[&str] = &[
    "学习", "方式", "偏好", "喜欢", "倾向", "风格", "习惯", "极速", "慢慢", "挑战", "简单", "难度", "兴趣",
    "环节", "知识点",
];

/// Keyword cues for the existing-foundation dimension
const FOUNDATION_KEYWORDS: &[&str] = &[
    "经验", "基础", "能力", "技能", "迁移", "模式", "有效", "资源", "书籍", "视频", "实操", "导师", "工具",
    "平台", "类似", "项目",
];

/// Keyword cues for the priority/trade-off dimension
const PRIORITY_KEYWORDS: &[&str] = &[
    "优先级", "质量", "标准", "妥协", "要求", "时间", "分配", "精力", "成果", "期待", "理想", "最低", "交付",
    "完成", "快速", "打磨",
];

/// A candidate question with its screening verdict
#[derive(Debug, Clone)]
pub struct ScreenedQuestion {
    pub question: FollowUpQuestion,
    pub is_duplicate: bool,
}

/// Token-set Jaccard similarity between two question texts
///
/// Case-insensitive, whitespace-tokenized. Two empty texts score 0.0, not
/// 1.0 - an empty question matches nothing.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let tokens_a: std::collections::HashSet<String> =
        a.to_lowercase().split_whitespace().map(str::to_string).collect();
    let tokens_b: std::collections::HashSet<String> =
        b.to_lowercase().split_whitespace().map(str::to_string).collect();

    let union = tokens_a.union(&tokens_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    intersection as f64 / union as f64
}

/// True when `text` duplicates any question in `history`
///
/// Exact match after lowercase/trim, or token-set similarity at the
/// threshold or above.
pub fn is_duplicate(text: &str, history: &[String]) -> bool {
    let needle = text.trim().to_lowercase();
    history.iter().any(|prior| {
        prior.trim().to_lowercase() == needle || jaccard(text, prior) >= SIMILARITY_THRESHOLD
    })
}

/// Screen a round of candidate questions against the cross-round history
///
/// Duplicates are flagged, never dropped - the caller decides whether to
/// surface them. Candidates within the same round are not compared against
/// each other, only against history.
pub fn screen(candidates: Vec<FollowUpQuestion>, history: &[String]) -> Vec<ScreenedQuestion> {
    let screened: Vec<ScreenedQuestion> = candidates
        .into_iter()
        .map(|question| {
            let is_duplicate = is_duplicate(&question.question, history);
            ScreenedQuestion { question, is_duplicate }
        })
        .collect();

    let duplicates = screened.iter().filter(|s| s.is_duplicate).count();
    debug!(
        candidates = screened.len(),
        duplicates,
        history = history.len(),
        "screen: done"
    );
    screened
}

/// Infer a question's dimension from keyword cues in its text
///
/// Checks preference, then foundation, then priority; anything with no cue
/// lands in priority.
pub fn infer_category(text: &str) -> QuestionCategory {
    if PREFERENCE_KEYWORDS.iter().any(|k| text.contains(k)) {
        QuestionCategory::Preference
    } else if FOUNDATION_KEYWORDS.iter().any(|k| text.contains(k)) {
        QuestionCategory::Foundation
    } else {
        QuestionCategory::Priority
    }
}

/// Fill in missing categories and force coverage of all three dimensions
///
/// When the round has three or more questions, the first three are pinned to
/// preference, foundation, and priority in that order unless the model
/// already assigned them - one question per dimension beats three variants
/// of the same one.
pub fn ensure_categories(questions: &mut [FollowUpQuestion]) {
    for q in questions.iter_mut() {
        if q.category.is_none() {
            q.category = Some(infer_category(&q.question));
        }
    }

    if questions.len() >= 3 {
        let covered: std::collections::HashSet<QuestionCategory> =
            questions.iter().filter_map(|q| q.category).collect();
        if covered.len() < 3 {
            let pins = [
                QuestionCategory::Preference,
                QuestionCategory::Foundation,
                QuestionCategory::Priority,
            ];
            for (q, pin) in questions.iter_mut().zip(pins) {
                q.category = Some(pin);
            }
        }
    }
}

/// Stock questions used when the question agent fails or returns nothing
pub fn default_questions() -> Vec<FollowUpQuestion> {
    vec![
        FollowUpQuestion {
            id: "default-1".to_string(),
            question: "你更倾向于哪种学习方式？".to_string(),
            kind: crate::domain::QuestionType::Single,
            options: Some(vec![
                "系统化学习，先打好理论基础".to_string(),
                "项目驱动，边做边学".to_string(),
                "碎片化学习，利用零散时间".to_string(),
            ]),
            category: Some(QuestionCategory::Preference),
        },
        FollowUpQuestion {
            id: "default-2".to_string(),
            question: "你之前有类似项目的经验吗？".to_string(),
            kind: crate::domain::QuestionType::Single,
            options: Some(vec![
                "完全没有，从零开始".to_string(),
                "有一些相关基础".to_string(),
                "做过类似的事情".to_string(),
            ]),
            category: Some(QuestionCategory::Foundation),
        },
        FollowUpQuestion {
            id: "default-3".to_string(),
            question: "你对成果的期待是？".to_string(),
            kind: crate::domain::QuestionType::Single,
            options: Some(vec![
                "达到能用的程度就行".to_string(),
                "希望做到比较熟练".to_string(),
                "追求高质量的产出".to_string(),
            ]),
            category: Some(QuestionCategory::Priority),
        },
    ]
}
