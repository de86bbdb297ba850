//! Prompt construction for the analysis and generation agents
//!
//! All prompts are Chinese-language and deliberately rigid about output
//! format: the analysis agents are told to answer in one line, the
//! generation agents to emit nothing but JSON. Everything volatile (goal
//! text, dates, prior rounds) is interpolated here so the orchestrator
//! stays format-free.

use chrono::{Datelike, Days, NaiveDate};

use crate::domain::{AnalysisResult, AnswerMap, FollowUpQuestion, GoalProfile, TaskHierarchy};

/// Default planning horizon when no deadline is set
const DEFAULT_HORIZON_DAYS: i64 = 30;

/// How many Day-N date examples the breakdown prompt quotes
const DATE_EXAMPLE_COUNT: i64 = 7;

/// Task-type analysis prompt (stage 1, fast model)
pub fn task_type_prompt(profile: &GoalProfile) -> String {
    format!(
        "分析以下目标属于哪种任务类型，只返回类型名称和简短描述（50字以内）。\n\n\
         目标：{}\n\n\
         常见任务类型：\n\
         - 技能学习类：学习编程、学习语言、学习乐器等\n\
         - 项目开发类：开发网站、开发APP、写毕业论文等\n\
         - 健康健身类：减肥、增肌、跑步训练等\n\
         - 考试备考类：考研、考公、考证等\n\
         - 阅读写作类：读完N本书、写小说等\n\
         - 生活目标类：装修房子、旅行规划等\n\n\
         返回格式：类型名称 - 简短描述\n\
         例如：技能学习类 - 网页开发",
        profile.goal
    )
}

/// Experience-level assessment prompt (stage 1, fast model)
pub fn experience_prompt(profile: &GoalProfile) -> String {
    format!(
        "根据用户的目标和自评经验，给出更精准的经验水平评估。\n\n\
         目标：{}\n\
         用户自评：{}\n\n\
         请判断用户在该领域的真实水平，给出简短评估（50字以内）。\n\n\
         返回格式：水平等级 - 具体描述\n\
         例如：零基础 - 完全没有编程经验，需要从基础概念开始",
        profile.goal,
        profile.experience.label()
    )
}

/// Time-span judgment prompt (stage 1, fast model)
pub fn time_span_prompt(profile: &GoalProfile, today: NaiveDate) -> String {
    let time_info = match profile.days_until_deadline(today) {
        Some(days) => format!("距离截止{days}天"),
        None => "无固定截止日期".to_string(),
    };

    format!(
        "根据目标、截止日期和每日可用时间，判断应该用什么时间跨度来拆解任务。\n\n\
         目标：{}\n\
         时间情况：{}\n\
         每日可用：{}小时\n\n\
         请判断：\n\
         1. 时间跨度：长期(半年以上) / 中期(1-6个月) / 短期(1个月内)\n\
         2. 拆解层级：应该用哪些层级（年度/季度/月度/周度/日度）\n\n\
         返回格式：时间跨度 - 拆解层级建议\n\
         例如：中期(3个月) - 使用月度+周度+日度三层拆解",
        profile.goal, time_info, profile.daily_hours
    )
}

/// Breakdown system prompt (stage 2, deep model)
pub fn breakdown_system_prompt() -> &'static str {
    r#"你是专业任务拆解器。你的核心能力是将任何需求拆解成可执行的月度→周度→日度任务计划。

## 你的输出格式

严格按照以下JSON格式输出：

```json
{
  "project_name": "项目名称",
  "overview": "项目概述（1-2句话）",
  "monthly": {
    "第1个月": {
      "goal": "月度目标概述",
      "output": "该月的最终产出",
      "weeks": ["第1周", "第2周", "第3周", "第4周"]
    }
  },
  "weekly": {
    "第1周": {
      "goal": "本周目标",
      "output": "本周明确产出（如：产出：4个页面能互相跳转）",
      "focus": "本周重点领域"
    }
  },
  "daily": {
    "第1周": {
      "Day1": {
        "title": "定主题与素材",
        "description": "选博物馆风格 + 找20张图片素材，建本地文件夹",
        "hours": 1,
        "output": "产出：选定风格 + 20张素材"
      }
    }
  }
}
```

## 拆解原则

### 月度任务
- 描述该月的整体目标
- 说明该月的最终产出
- 列出包含的周次

### 周度任务
- 明确本周要达成什么
- **必须用"产出："开头描述具体成果**
- 说明本周的重点领域

### 日度任务
- 每天任务必须在1小时内完成
- 描述要具体可执行（不是"学习XX"而是"做XX卡片布局"）
- 每天都有明确的产出
- 每周最后一天设为"机动"日，用于查漏补缺

## 重要规则

1. **每日任务必须可执行**：避免模糊的描述，如"学习"、"了解"，要用具体的动作
2. **产出导向**：每个周度任务和日度任务都要有明确的产出
3. **时间约束**：假设每天只有1小时可用时间
4. **渐进式**：任务要从简单到复杂，循序渐进
5. **机动日**：每周最后一天设为机动日

只返回JSON，不要有任何其他文字。"#
}

/// Breakdown user prompt (stage 2, deep model)
pub fn breakdown_user_prompt(profile: &GoalProfile, analysis: &AnalysisResult, start: NaiveDate) -> String {
    let days_left = profile
        .days_until_deadline(start)
        .filter(|d| *d > 0)
        .unwrap_or(DEFAULT_HORIZON_DAYS);
    let weeks_count = (days_left / 7).max(1);

    let mut date_examples = Vec::new();
    for i in 0..DATE_EXAMPLE_COUNT.min(days_left) {
        if let Some(date) = start.checked_add_days(Days::new(i as u64)) {
            date_examples.push(format!("Day{}: {}月{}日", i + 1, date.month(), date.day()));
        }
    }

    format!(
        "请将以下需求拆解成详细的月度→周度→日度任务计划：\n\n\
         ## 用户需求\n{}\n\n\
         ## 时间约束\n\
         - 每天可用时间：{} 小时\n\
         - 总周期：{} 周\n\
         - 开始日期：{}年{}月{}日\n\n\
         ## 日期格式示例\n{}\n\n\
         ## AI分析结果\n\
         - 任务类型：{}\n\
         - 经验水平：{}\n\
         - 时间跨度：{}\n\n\
         ## 拆解要求\n\
         1. **月度任务**：描述整体目标和最终产出\n\
         2. **周度任务**：每周目标 + 明确产出（必须用\"产出：\"开头）\n\
         3. **日度任务**：每天1小时内能完成的具体操作，每步都有产出\n\
         4. **每周最后一天**：设为\"机动\"日，用于查漏补缺\n\
         5. **任务递进**：从简单到复杂，循序渐进\n\n\
         请严格按照JSON格式输出，不要有其他文字。",
        profile.goal,
        profile.daily_hours,
        weeks_count,
        start.year(),
        start.month(),
        start.day(),
        date_examples.join(", "),
        analysis.task_type,
        analysis.experience_level,
        analysis.time_span,
    )
}

/// Regeneration user prompt (stage 2, deep model)
///
/// Quotes a condensed summary of the previous plan plus the accumulated
/// answers, and asks for a complete replacement plan in the same format.
pub fn regenerate_user_prompt(
    profile: &GoalProfile,
    analysis: &AnalysisResult,
    previous_tasks: &TaskHierarchy,
    answers: &AnswerMap,
) -> String {
    let answers_text: Vec<String> = answers
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(key, value)| format!("- {}: {}", key, value.summary()))
        .collect();

    format!(
        "请根据用户的补充信息，重新生成完整的任务计划：\n\n\
         ## 用户原始需求\n{}\n\n\
         ## AI分析结果\n\
         - 任务类型：{}\n\
         - 经验水平：{}\n\
         - 时间跨度：{}\n\n\
         ## 原始任务计划摘要\n\n{}\n\n\
         ## 用户补充信息（用于优化任务）\n\n{}\n\n\
         ## 输出要求\n\n\
         请重新生成一个**完整的**任务拆解计划，包含所有月份、所有周、所有天的任务。\n\
         请严格按照与首次拆解相同的JSON格式输出，不要有其他文字。",
        profile.goal,
        analysis.task_type,
        analysis.experience_level,
        analysis.time_span,
        previous_tasks.condensed_summary(),
        answers_text.join("\n"),
    )
}

/// Follow-up question prompt (stage 2, deep model)
pub fn questions_prompt(profile: &GoalProfile, analysis: &AnalysisResult, history: &[FollowUpQuestion]) -> String {
    let input = serde_json::json!({
        "goal": profile.goal,
        "user_profile": {
            "experience_level": profile.experience.label(),
            "daily_hours": format!("{}小时", profile.daily_hours),
            "working_days": profile.working_days,
            "importance": format!("{}/5", profile.importance),
            "deadline": profile.deadline.map(|d| d.to_string()).unwrap_or_else(|| "无".to_string()),
        },
        "context": {
            "blockers": if profile.blockers.is_empty() { "无" } else { &profile.blockers },
            "resources": if profile.resources.is_empty() { "无" } else { &profile.resources },
            "expectations": profile.expectations,
        },
        "ai_analysis": {
            "task_type": analysis.task_type,
            "experience_level": analysis.experience_level,
            "time_span": analysis.time_span,
        }
    });

    let previous_block = if history.is_empty() {
        String::new()
    } else {
        let list: Vec<String> = history.iter().map(|q| format!("- {}", q.question)).collect();
        format!("\n## 已问过的问题（请避免重复或高度相似）\n{}\n", list.join("\n"))
    };

    format!(
        "你是补充问题生成器。\n\n\
         ## 你的职责\n\
         你不负责生成计划，也不负责修改任务；你只负责提出高价值的补充问题，帮助下一步让计划更准确、更可执行。\n\n\
         ## 输入信息\n{}\n{}\
         ## 输出要求\n\
         生成1~3个高信息增益的补充问题，遵循以下原则：\n\
         ### 🎯 个人偏好维度（挖掘学习习惯与风格）\n\
         对哪一环节、知识点、学习方式更感兴趣；喜欢极速还是一步一步慢慢来；喜欢直接挑战还是先简单后难\n\
         ### 🧠 个人基础维度（了解能力现状与潜力）\n\
         相关经验、技能迁移、学习模式、资源偏好（书籍vs视频vs实操vs导师）、工具熟悉度\n\
         ### ⚖️ 任务优先级维度（明确价值判断与取舍）\n\
         质量标准（哪些可以妥协）、时间分配、成果期待（理想状态vs最低标准）\n\n\
         输出规则：\n\
         1. **高信息增益**：优先问若回答会显著改变任务结构或排程的因素\n\
         2. **避免重复**：不要问用户已经填写过的问题\n\
         3. **可选语气**：用户可以跳过，不要用强制性语言\n\n\
         ## 输出格式\n\
         只返回JSON数组，不要输出解释、markdown、代码块、额外字段：\n\n\
         [{{\"id\": \"q1\", \"question\": \"单选问题\", \"type\": \"single\", \"options\": [\"选项1\", \"选项2\", \"选项3\"]}}, \
         {{\"id\": \"q2\", \"question\": \"多选问题\", \"type\": \"multiple\", \"options\": [\"选项A\", \"选项B\", \"选项C\"]}}]",
        serde_json::to_string_pretty(&input).unwrap_or_default(),
        previous_block,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QuestionType;

    fn profile() -> GoalProfile {
        GoalProfile {
            goal: "学习网页开发".to_string(),
            daily_hours: "2".to_string(),
            importance: 4,
            ..Default::default()
        }
    }

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            task_type: "技能学习类 - 网页开发".to_string(),
            experience_level: "零基础 - 需要从基础概念开始".to_string(),
            time_span: "中期(3个月) - 月度+周度+日度".to_string(),
        }
    }

    #[test]
    fn test_task_type_prompt_embeds_goal() {
        let p = task_type_prompt(&profile());
        assert!(p.contains("学习网页开发"));
        assert!(p.contains("返回格式"));
    }

    #[test]
    fn test_time_span_prompt_deadline_wording() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();

        let p = time_span_prompt(&profile(), today);
        assert!(p.contains("无固定截止日期"));

        let with_deadline = GoalProfile {
            deadline: NaiveDate::from_ymd_opt(2026, 2, 4),
            ..profile()
        };
        let p = time_span_prompt(&with_deadline, today);
        assert!(p.contains("距离截止30天"));
    }

    #[test]
    fn test_breakdown_user_prompt_dates_and_weeks() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let p = breakdown_user_prompt(&profile(), &analysis(), start);

        // default horizon of 30 days -> 4 weeks
        assert!(p.contains("总周期：4 周"));
        assert!(p.contains("开始日期：2026年1月5日"));
        assert!(p.contains("Day1: 1月5日"));
        assert!(p.contains("Day7: 1月11日"));
        assert!(p.contains("技能学习类"));
    }

    #[test]
    fn test_questions_prompt_includes_history() {
        let history = vec![FollowUpQuestion::new(
            "q1",
            "你更倾向于哪种学习方式？",
            QuestionType::Single,
        )];
        let p = questions_prompt(&profile(), &analysis(), &history);

        assert!(p.contains("已问过的问题"));
        assert!(p.contains("- 你更倾向于哪种学习方式？"));
        assert!(p.contains("只返回JSON数组"));

        let p = questions_prompt(&profile(), &analysis(), &[]);
        assert!(!p.contains("已问过的问题"));
    }

    #[test]
    fn test_regenerate_prompt_summary_and_answers() {
        let mut tasks = TaskHierarchy::default();
        tasks.monthly.insert(
            "第1个月".to_string(),
            vec![crate::domain::TaskNode {
                id: "m1".to_string(),
                title: "HTML基础".to_string(),
                ..Default::default()
            }],
        );

        let mut answers = AnswerMap::new();
        answers.insert(
            "q1".to_string(),
            crate::domain::AnswerValue::Text("项目驱动".to_string()),
        );
        answers.insert("q2".to_string(), crate::domain::AnswerValue::Text("  ".to_string()));

        let p = regenerate_user_prompt(&profile(), &analysis(), &tasks, &answers);
        assert!(p.contains("- 第1个月: HTML基础"));
        assert!(p.contains("- q1: 项目驱动"));
        // blank answers are dropped
        assert!(!p.contains("- q2:"));
    }
}
