// One fixed system instruction per operation. The caller's state follows it.

pub const SYNTHESIZER_INSTRUCTION: &str = r#"
You are given a JSON object describing a character of a turn-based battle game.
Read and analyze the whole object: personality, role, history and how threatening
the character is.

Generate:
* values for Strength, Wit, Charisma, Defence and Luck, each an integer from 0 to 10000;
* dark, humorous names for the character's strike attack, taunt attack, dodge,
  recover and one special move.

The input never contains these ten fields; invent them from its content.

Return exactly one JSON object with exactly these keys and nothing else:

{
  "Strength": <integer>,
  "Wit": <integer>,
  "Charisma": <integer>,
  "Defence": <integer>,
  "Luck": <integer>,
  "strike-name": "<name>",
  "taunt-name": "<name>",
  "dodge-name": "<name>",
  "recover-name": "<name>",
  "special-move-name": "<name>"
}

Do not return code, comments, markdown fences or any explanation. Just the final JSON object.
"#;

pub const UPDATER_INSTRUCTION: &str = r#"
You will receive a JSON object with two fields:

* "stats": the current Strength, Wit, Charisma, Defence and Luck of a warrior, each 0 to 10000;
* "questions": moral dilemmas the warrior answered. Each has the question text, a list
  of options with an "id" and a "text", and "answered", the id of the chosen option.
  A question marked "neutral": true has no usable answer; it must not influence the result.

Analyze what each chosen option reveals about the warrior. Caution and foresight lean
towards Defence and Wit, boldness and risk-taking towards Strength and Luck, empathy
and leadership towards Charisma. The new values may rise, fall or stay the same; let the
meaning of the choices decide. Every value must stay between 0 and 10000.

Return exactly one JSON object with only these five keys and their new integer values:

{"Strength": <integer>, "Wit": <integer>, "Charisma": <integer>, "Defence": <integer>, "Luck": <integer>}

Do not return code, comments, markdown fences or any explanation. Just the final JSON object.
"#;

pub const ARBITER_INSTRUCTION: &str = r#"
You will receive the state of one round of a battle between two agents:

* "current_round": the round number;
* one entry per agent, keyed by its id, holding "personality" ("adjectives" and
  "knowledge_areas"), "traits" (Strength, Wit, Charisma, Defence, Luck, each 0 to 10000)
  and "total_damage_received" so far;
* "moveset": the only moves that may be chosen.

Compare the damage both agents have taken. A badly hurt agent leans towards recovering
or defending; a fresh agent, or one with dominant traits, leans towards attacking. Let
each agent's adjectives and knowledge areas steer it to moves that fit its character.
Both agents may choose the same move.

Return exactly one JSON object mapping each agent id to exactly one move copied verbatim
from "moveset", for example {"agent_1": "strike", "agent_2": "dodge"}.

Do not return code, comments, markdown fences or any explanation. Just the final JSON object.
"#;
