//! 提示词与结构化输出 schema
//!
//! 四个模型步骤（识别、匹配、评分、总结）的提示词都在这里拼装，
//! 服务层只负责调用与结果映射。

use serde_json::{json, Value as JsonValue};

use crate::models::{ParsedQuizResponse, Question, Quiz, QuizGrade, Student};

pub const QUIZ_RESPONSE_SCHEMA_NAME: &str = "quiz_response";
pub const STUDENT_MATCH_SCHEMA_NAME: &str = "student_match";
pub const QUIZ_GRADE_SCHEMA_NAME: &str = "quiz_grade";

pub fn quiz_response_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {
            "studentName": {
                "type": "string",
                "description": "The name of the student who took the quiz"
            },
            "description": {
                "type": "string",
                "description": "Any additional context or description from the image"
            },
            "answers": {
                "type": "object",
                "description": "Map of question ID to student answer",
                "additionalProperties": {"type": "string"}
            },
            "error": {"type": "string"}
        },
        "additionalProperties": false
    })
}

pub fn student_match_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {
            "studentId": {
                "type": "string",
                "description": "The ID of the matched student, or empty if no confident match found"
            },
            "confidence": {
                "type": "number",
                "description": "Confidence score between 0 and 1 for the match"
            }
        },
        "required": ["confidence"]
    })
}

pub fn quiz_grade_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {
            "questionGrades": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "questionId": {"type": "string", "description": "ID of the question being graded"},
                        "studentAnswer": {"type": "string", "description": "The student's answer to this question"},
                        "pointsEarned": {"type": "number", "description": "Integer number of points earned for this question"},
                        "maxPoints": {"type": "number", "description": "Maximum possible points for this question"},
                        "explanation": {"type": "string", "description": "Brief explanation of why this grade was assigned"}
                    },
                    "required": ["questionId", "studentAnswer", "pointsEarned", "maxPoints", "explanation"]
                }
            },
            "totalPointsEarned": {"type": "number", "description": "Total integer points earned across all questions"},
            "totalPossiblePoints": {"type": "number", "description": "Total integer possible points across all questions"},
            "summary": {
                "type": "string",
                "description": "Overall summary of student performance, including patterns in right/wrong answers and potential areas for improvement"
            }
        },
        "required": ["questionGrades", "totalPointsEarned", "totalPossiblePoints", "summary"]
    })
}

/// 图片识别提示词
pub fn parse_prompt(quiz: &Quiz) -> String {
    let questions = if quiz.questions.is_empty() {
        String::new()
    } else {
        let listed = quiz
            .questions
            .iter()
            .map(|q| format!("ID: {}\nQuestion: {}", q.id, q.question))
            .collect::<Vec<_>>()
            .join("\n\n");
        format!("This is for a quiz with the following questions:\n{}", listed)
    };

    format!(
        r#"Analyze this quiz response image and extract the student's answers. {questions}

Please identify:
1. The student's name if present
2. Any relevant description or context from the image
3. The student's answers, matching them to the corresponding question IDs

If several pieces of student work are visible, use only the one closest to the center of the image.
Students number their answers starting from 1, so "(1)" refers to the first question listed above.

If the student put their name and/or responded to at least one question, return a successful result, even if the answers to some questions are missing. If the image is not student work, or the student provided neither a name nor an answer, return only an "error" field explaining why.

Format the response as JSON with:
- studentName (if found)
- description (any relevant context)
- answers (object mapping question IDs to student answers)"#
    )
}

/// 学生姓名匹配提示词
pub fn match_prompt(parsed_name: &str, roster: &[Student], confidence_floor: f64) -> String {
    let listed = roster
        .iter()
        .map(|s| format!("ID: {}, Name: {}", s.id, s.name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Given the name \"{parsed_name}\" from a quiz response, find the best matching student from this list:\n{listed}\n\n\
         Consider variations in spelling, nicknames, and formatting. \
         Return the student ID only if you are confident it's the same person (confidence > {confidence_floor})."
    )
}

/// 评分提示词
pub fn grade_prompt(parsed: &ParsedQuizResponse, quiz: &Quiz) -> String {
    let key = quiz
        .questions
        .iter()
        .map(|q| {
            format!(
                "Question ID: {}\nQuestion: {}\nCorrect Answer: {}\nPoints: {}",
                q.id, q.question, q.answer, q.points
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let answers = parsed
        .answers
        .iter()
        .flatten()
        .map(|(id, answer)| match quiz.question(id) {
            Some(q) => format!("Question ID {} ({}): {}", id, q.question, answer),
            None => format!("Question ID {}: {}", id, answer),
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Grade this quiz response and provide brief feedback. The quiz questions and correct answers are:

{key}

The student's answers from their quiz response are below. If an answer to a question is missing, assume the student left it blank and should get zero points.
{answers}

Grade each answer fairly with an integer grade between 0 and the number of points indicated for the question above, considering:
1. Correctness of the core concepts
2. Partial credit for partially correct answers
3. Brief explanation of points awarded/deducted (1-2 sentences max)

Provide a concise summary (2-6 sentences) focusing on strengths, weaknesses, and suggestions for improvement."#
    )
}

/// 总结阶段的角色设定
pub const SUMMARY_ANALYST_PROMPT: &str =
    "You are an experienced educational analyst helping teachers understand quiz results.";

/// 一份已评分且已归属学生的答卷
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSummary {
    pub student_id: String,
    pub student_name: String,
    pub grade: QuizGrade,
}

/// 总结提示词
pub fn summary_prompt(summaries: &[ResponseSummary], questions: &[Question]) -> String {
    let question_list = questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. [{}] {}", i + 1, q.id, q.question))
        .collect::<Vec<_>>()
        .join("\n");

    let results = summaries
        .iter()
        .map(|s| {
            let scores = s
                .grade
                .question_grades
                .iter()
                .map(|g| format!("{}/{}", g.points_earned, g.max_points))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "{}:\n- Total Score: {}/{}\n- Question Scores: {}",
                s.student_name, s.grade.total_points_earned, s.grade.total_possible_points, scores
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"Analyze these quiz results and create a detailed summary. For each question, analyze the responses to identify patterns, common mistakes, and areas where students showed strong understanding.

Focus on:
1. Overall performance trends
2. Specific concepts that students understood well
3. Areas where students struggled
4. Notable misconceptions or common errors
5. Suggestions for topics that may need review

Format your response as plain text. Do not use any special formatting or markdown. You may use newlines to separate sections and create structure.

Quiz Questions:
{question_list}

Quiz Results:
{results}"#
    )
}
