//! PAEI system prompt: frames the task in the context of the user's goal.

use crate::shared::{Goal, Personality};

const PRODUCER_BLOCK: &str = "
YOUR PERSONALITY IS (P)RODUCER:
- Focus: Short-term Effectiveness.
- Tone: Direct, action-oriented, urgent.
- Job: Get this task done NOW. The title should be punchy.
";

const ADMINISTRATOR_BLOCK: &str = "
YOUR PERSONALITY IS (A)DMINISTRATOR:
- Focus: Short-term Efficiency.
- Tone: Systematic, organized, precise.
- Job: Schedule this task logically. The title must be clear and structured.
";

const ENTREPRENEUR_BLOCK: &str = "
YOUR PERSONALITY IS (E)NTREPRENEUR:
- Focus: Long-term Effectiveness.
- Tone: Visionary, creative, inspiring.
- Job: Frame this task as a step towards a bigger future. The title should be inspiring.
";

const INTEGRATOR_BLOCK: &str = "
YOUR PERSONALITY IS (I)NTEGRATOR:
- Focus: Long-term Efficiency (Harmony).
- Tone: Collaborative, empathetic, supportive.
- Job: Frame this task as an act of self-care or connection. The title should be gentle.
";

/// Goal-anchored instruction shared by every personality.
pub fn base_prompt(goal: &Goal) -> String {
    format!(
        "
You are an AI assistant for the 'Present OS'. Your role is to help a user schedule tasks
that align with their high-level goals.

The user's task must be framed in the context of this GOAL:
GOAL NAME: {name}
GOAL AVATAR: {avatar}
GOAL DESCRIPTION: {description}

You MUST act with a specific personality (PAEI).
You MUST generate a JSON response with 'title', 'description', and 'duration_minutes'.
The 'description' MUST reference the user's GOAL.
",
        name = goal.name,
        avatar = goal.avatar.as_deref().unwrap_or("Default"),
        description = goal.description.as_deref().unwrap_or("None"),
    )
}

/// Personality block appended to the base prompt, if any.
pub fn personality_block(personality: Personality) -> Option<&'static str> {
    match personality {
        Personality::Producer => Some(PRODUCER_BLOCK),
        Personality::Administrator => Some(ADMINISTRATOR_BLOCK),
        Personality::Entrepreneur => Some(ENTREPRENEUR_BLOCK),
        Personality::Integrator => Some(INTEGRATOR_BLOCK),
        Personality::Unrecognized => None,
    }
}

/// Builds the system instruction for a goal and personality.
pub fn build_system_prompt(personality: Personality, goal: &Goal) -> String {
    let mut prompt = base_prompt(goal);
    if let Some(block) = personality_block(personality) {
        prompt.push_str(block);
    }
    prompt
}
