//! Deterministic fallback plan.
//!
//! When nothing else yields a plan, the orchestrator returns this one. The
//! normalizer also splices its procedures into plans that arrive without
//! any. It performs no I/O and cannot fail, and its output satisfies every
//! plan invariant for both function types.

use crate::plan::{
    AudienceEntry, Bilingual, FunctionType, GenerationRequest, LessonPlan, ProcedureStep,
    TeachingPreparation,
};

/// Fallback method tag when the request names none.
const DEFAULT_METHOD: &str = "communicative";

/// Fallback grade label when the request names none.
const DEFAULT_GRADE: &str = "All grades";

/// Topic used when the request's topic is blank.
const DEFAULT_TOPIC: &str = "English";

/// (zh title, en title, zh content, en content). `{t}` is replaced by the topic.
const STEPS: [(&str, &str, &str, &str); 10] = [
    (
        "问候与热身",
        "Greeting and Warm-up",
        "- 师生互相问候\n- 播放与「{t}」相关的歌曲或图片，活跃课堂气氛",
        "- Greet the class\n- Play a song or show pictures related to **{t}** to warm up",
    ),
    (
        "话题导入",
        "Lead-in",
        "- 提问：你对「{t}」了解多少？\n- 请两三名学生分享已有经验",
        "- Ask: *What do you already know about {t}?*\n- Invite two or three students to share",
    ),
    (
        "词汇呈现",
        "Vocabulary Presentation",
        "- 借助图片和实物呈现与「{t}」相关的核心词汇\n- 教师示范发音，学生跟读",
        "- Present core words about **{t}** with pictures and realia\n- Model pronunciation; students repeat",
    ),
    (
        "词汇操练",
        "Vocabulary Practice",
        "- 快闪卡片游戏\n- 学生分组认读并拼写新词",
        "- Flash-card game\n- Students read and spell the new words in groups",
    ),
    (
        "句型呈现",
        "Sentence Pattern Presentation",
        "- 在情境中呈现谈论「{t}」的目标句型\n- 板书句型结构",
        "- Present the target sentence patterns for talking about **{t}** in context\n- Write the structures on the board",
    ),
    (
        "句型操练",
        "Guided Practice",
        "- 替换练习\n- 教师提问，学生用目标句型回答",
        "- Substitution drills\n- Teacher asks questions; students answer with the target patterns",
    ),
    (
        "同伴活动",
        "Pair Work",
        "- 两人一组，围绕「{t}」进行问答对话",
        "- In pairs, students ask and answer questions about **{t}**",
    ),
    (
        "小组任务",
        "Group Task",
        "- 小组合作完成一张关于「{t}」的海报或思维导图",
        "- Groups make a poster or mind map about **{t}**",
    ),
    (
        "展示与反馈",
        "Presentation and Feedback",
        "- 各组展示成果\n- 教师和同学给予评价与反馈",
        "- Groups present their work\n- Teacher and classmates give feedback",
    ),
    (
        "总结与作业",
        "Summary and Homework",
        "- 回顾本课关于「{t}」的词汇和句型\n- 布置作业：用所学句型写三句话",
        "- Review the words and patterns about **{t}**\n- Homework: write three sentences using today's patterns",
    ),
];

/// Build the fallback plan for a topic, grade, and total duration.
///
/// The secondary-language title is always `Emergency Lesson Plan for <topic>`,
/// where a blank `topic` reads as `English`. A blank `grade` becomes
/// `All grades`.
pub fn emergency_plan(topic: &str, grade: &str, duration: u32) -> LessonPlan {
    let topic = display_topic(topic);
    let duration = effective_duration(duration);
    let grade = if grade.trim().is_empty() {
        DEFAULT_GRADE.to_string()
    } else {
        grade.trim().to_string()
    };

    LessonPlan {
        title: Bilingual::new(
            format!("「{topic}」应急教学方案"),
            format!("Emergency Lesson Plan for {topic}"),
        ),
        grade,
        duration,
        teaching_method: DEFAULT_METHOD.to_string(),
        preparation: emergency_preparation(topic),
        procedures: emergency_procedures(topic, duration),
    }
}

/// [`emergency_plan`] for a request, keeping its teaching method when set.
pub fn emergency_plan_for(req: &GenerationRequest) -> LessonPlan {
    let mut plan = emergency_plan(&req.topic, &req.grade, req.duration);
    if !req.teaching_method.trim().is_empty() {
        plan.teaching_method = req.teaching_method.trim().to_string();
    }
    plan
}

/// The fallback procedure sequence.
///
/// Always ten steps, inside the window of every [`FunctionType`]. Step
/// durations add up to `duration` (or the default lesson length when zero).
/// A blank `topic` reads as `English` in the step text.
pub fn emergency_procedures(topic: &str, duration: u32) -> Vec<ProcedureStep> {
    let topic = display_topic(topic);
    let minutes = split_minutes(effective_duration(duration), STEPS.len());

    STEPS
        .iter()
        .zip(minutes)
        .map(|((zh_title, en_title, zh_body, en_body), minutes)| ProcedureStep {
            title: Bilingual::new(zh_title.to_string(), en_title.to_string()),
            content: Bilingual::new(zh_body.replace("{t}", topic), en_body.replace("{t}", topic)),
            duration: Some(minutes),
        })
        .collect()
}

fn emergency_preparation(topic: &str) -> TeachingPreparation {
    TeachingPreparation {
        objectives: Bilingual::new(
            vec![
                format!("能够认读并运用与「{topic}」相关的核心词汇"),
                format!("能够运用目标句型谈论「{topic}」"),
                "能够在小组活动中积极合作与表达".to_string(),
            ],
            vec![
                format!("Recognise and use core vocabulary about {topic}"),
                format!("Use the target sentence patterns to talk about {topic}"),
                "Cooperate and express ideas actively in group work".to_string(),
            ],
        ),
        key_words: Bilingual::both(vec![topic.to_string()]),
        sentence_structures: Bilingual::new(
            vec![
                format!("你对「{topic}」了解多少？"),
                format!("我认为「{topic}」……"),
            ],
            vec![
                format!("What do you know about {topic}?"),
                format!("I think {topic} is ..."),
            ],
        ),
        teaching_aids: Bilingual::new(
            format!("黑板、单词卡片、与「{topic}」相关的图片"),
            format!("Whiteboard, word cards, pictures about {topic}"),
        ),
        student_analysis: Bilingual::new(
            "学生具备基础的听说能力，对贴近生活的话题兴趣较高。".to_string(),
            "Students have basic listening and speaking skills and enjoy topics close to daily life."
                .to_string(),
        ),
        audience_analysis: vec![AudienceEntry::new(
            AudienceEntry::GENERIC_CATEGORY,
            "Mixed-ability class; provide visual support and pair weaker students with stronger ones.",
        )],
    }
}

fn display_topic(topic: &str) -> &str {
    let trimmed = topic.trim();
    if trimmed.is_empty() { DEFAULT_TOPIC } else { trimmed }
}

fn effective_duration(duration: u32) -> u32 {
    if duration == 0 {
        GenerationRequest::DEFAULT_DURATION
    } else {
        duration
    }
}

/// Split `total` minutes over `parts` steps, earlier steps taking the remainder.
fn split_minutes(total: u32, parts: usize) -> Vec<u32> {
    let parts_u32 = parts as u32;
    let base = total / parts_u32;
    let remainder = (total % parts_u32) as usize;
    (0..parts)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}
