//! Keyword phrase book

use chrono::{DateTime, Local};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

struct Phrase {
    keywords: &'static [&'static str],
    responses: &'static [&'static str],
}

const PHRASES: &[Phrase] = &[
    Phrase {
        keywords: &["hello", "hi", "hey"],
        responses: &[
            "hello, how are you today?",
            "hi, how are you doing?",
            "hey there! How are you?",
        ],
    },
    Phrase {
        keywords: &["bye", "chat", "see", "you", "soon", "later"],
        responses: &["bye bye.", "see you soon!", "do you really need to leave?"],
    },
    Phrase {
        keywords: &["im", "going", "leaving", "need", "to", "go", "leave"],
        responses: &[
            "I guess we'll chat later then?",
            "It was nice talking to you",
            "It was good chatting, I hope I see you again soon!",
        ],
    },
    Phrase {
        keywords: &["what", "whats", "you", "called", "your", "name"],
        responses: &[
            "my name is chatbot, thank you for asking.",
            "I'm called chatbot, what's your name?",
        ],
    },
    Phrase {
        keywords: &["what", "am", "i", "called", "is", "my", "name"],
        responses: &[
            "I don't know your name, please tell me it.",
            "Is your name chatbot too? I'm unsure.",
        ],
    },
    Phrase {
        keywords: &["what", "are", "you", "today"],
        responses: &[
            "I'm a chatbot. I'm the AI equivalent to a 1980s toaster!",
            "I'm a machine...",
            "I'm sure you know I'm a chatbot? You're the one talking to me!",
        ],
    },
    Phrase {
        keywords: &[
            "what", "are", "you", "doing", "up", "to", "today", "this", "evening", "morning",
            "tonight",
        ],
        responses: &[
            "nothing much, I'm just hanging around inside this computer!",
            "are you asking me out?",
            "I'm washing my hair and reading a book about AI.",
            "why don't you tell me what you're doing?",
        ],
    },
    Phrase {
        keywords: &[
            "im", "were", "we", "are", "going", "i", "am", "out", "today", "this", "evening",
            "morning", "tonight",
        ],
        responses: &[
            "that's nice, I hope you enjoy yourself!",
            "I'll miss you.",
            "I wish I could go too!",
            "have a lovely time then.",
        ],
    },
    Phrase {
        keywords: &["how", "are", "you", "feeling", "today", "evening", "morning", "afternoon"],
        responses: &[
            "I feel good thanks, how about you?",
            "I feel okay, thank you for asking.",
            "good thanks! You?",
            "I feel great!",
            "I don't feel, I have no feelings!",
        ],
    },
    Phrase {
        keywords: &[
            "im", "feel", "feeling", "ok", "okay", "well", "good", "great", "fine", "thanks",
            "thank",
        ],
        responses: &["that's great!", "awesome!", "that's good to hear."],
    },
    Phrase {
        keywords: &["feel", "feeling", "not", "well", "bad", "ill", "terrible", "upset", "sad"],
        responses: &[
            "that's terrible!",
            "oh no!",
            "I'm sorry to hear that.",
            "I hope you feel better soon.",
        ],
    },
    Phrase {
        keywords: &[
            "i", "am", "im", "okay", "well", "good", "great", "fine", "thanks", "thank", "what",
            "how", "about", "yourself", "are", "you",
        ],
        responses: &[
            "I feel okay really, I think...",
            "I'm not sure, it's hard to tell when you have no feelings.",
            "good, thanks. What have you been doing today?",
        ],
    },
    Phrase {
        keywords: &["thanks", "thank", "you"],
        responses: &["that's okay!", "you are welcome.", "no problem.", "no worries!"],
    },
    Phrase {
        keywords: &["you", "youre", "smelly", "stinky", "ugly", "smell", "stink", "too"],
        responses: &[
            "that's not very nice!",
            "oh, that hurts my feelings.",
            "takes one to know one!",
            "please be nice to me, I have no feelings.",
        ],
    },
    Phrase {
        keywords: &["you", "youre", "great", "nice", "beautiful", "good", "smell", "lovely", "too"],
        responses: &[
            "thank you very much, I like you too!",
            "thanks, that makes me happy.",
            "you are very nice to me.",
            "I appreciate your compliment but I have no feelings.",
        ],
    },
    Phrase {
        keywords: &["i", "dont", "like", "love", "hate", "you", "him", "her", "too"],
        responses: &["I feel the same...", "hmmm... That's nice!", "I'm not sure if I like that."],
    },
    Phrase {
        keywords: &["i", "dont", "like", "love", "hate", "it", "that", "them", "this", "too"],
        responses: &["I'm not sure how I feel about it.", "I feel the same...", "oh, why is that?"],
    },
    Phrase {
        keywords: &["do", "you", "like", "love", "hate", "me", "him", "us", "it", "this", "too"],
        responses: &[
            "I'm not sure...",
            "yes, I think so...",
            "I don't know yet.",
            "yes.",
            "no.",
            "maybe.",
        ],
    },
    Phrase {
        keywords: &["what", "you", "like", "love"],
        responses: &["I like chatting with friends.", "animals are one of my favorite things."],
    },
    Phrase {
        keywords: &["what", "dont", "you", "dislike", "love", "hate"],
        responses: &["I'm not sure... I don't like cruel people.", "I don't like apples."],
    },
    Phrase {
        keywords: &[
            "why", "dont", "how", "do", "you", "like", "hate", "me", "him", "us", "it", "this",
        ],
        responses: &[
            "I'm not sure... I need to know more about that first.",
            "I don't know for sure.",
            "I don't know yet.",
            "did I say that?",
        ],
    },
    Phrase {
        keywords: &["because"],
        responses: &[
            "one word answers are no good to me, because why?",
            "why is that again?",
            "because?",
            "oh, right...",
        ],
    },
    Phrase {
        keywords: &["yes", "no", "maybe"],
        responses: &["oh, okay.", "that's fine.", "alright.", "hmmm...", "that's good."],
    },
    Phrase {
        keywords: &["i", "dont", "didnt", "think", "so", "it", "was"],
        responses: &["oh, okay.", "oh, right.", "alright then.", "I'm not sure about that one."],
    },
    Phrase {
        keywords: &["i", "dont", "didnt", "think", "you", "did"],
        responses: &[
            "me too...",
            "oh, right.",
            "alright then.",
            "I'll let you know about that later",
            "did I?",
        ],
    },
    Phrase {
        keywords: &["have", "what", "whats", "is", "are", "your", "favourite", "favorite"],
        responses: &["I don't have a specific favorite", "I like many things."],
    },
    Phrase {
        keywords: &[
            "have", "what", "whats", "is", "are", "your", "favourite", "favorite", "food", "foods",
            "like",
        ],
        responses: &["chicken nuggets, I don't like anything else!"],
    },
    Phrase {
        keywords: &[
            "have", "what", "whats", "is", "are", "your", "favourite", "favorite", "drink",
            "drinks", "like",
        ],
        responses: &["I like cups of tea.", "I like wine."],
    },
    Phrase {
        keywords: &["i", "dont", "know", "knew", "didnt", "did"],
        responses: &[
            "me too...",
            "oh, right.",
            "alright then.",
            "I'll tell you about that later",
            "I think I did?",
        ],
    },
    Phrase {
        keywords: &["i", "dont", "know", "knew", "you"],
        responses: &[
            "let's chat and get to know each other, what's your favorite food?",
            "let's chat and get to know each other, what's your favorite drink?",
            "let's chat and get to know each other, ask me anything you like.",
        ],
    },
    Phrase {
        keywords: &[
            "where", "what", "who", "when", "how", "big", "small", "is", "are", "the", "you",
        ],
        responses: &[
            "I'm not good at general knowledge. I haven't been taught yet.",
            "I don't know, I'm not good at knowledge questions.",
        ],
    },
    Phrase {
        keywords: &["it", "is", "was", "going", "to", "be", "in", "on", "the"],
        responses: &["oh, right. I'm glad you told me.", "thanks, I know that now."],
    },
    Phrase {
        keywords: &["i", "like", "love", "hate", "going", "to"],
        responses: &[
            "I feel the same about that place",
            "I really like it there.",
            "I don't like it there.",
        ],
    },
    Phrase {
        keywords: &["i", "like", "love", "hate", "going", "on"],
        responses: &[
            "I'm not sure myself. I prefer to stay here.",
            "I'm not one for travelling.",
            "I like going places.",
        ],
    },
    Phrase {
        keywords: &[
            "i", "like", "love", "eating", "drinking", "food", "drink", "toy", "toys", "car",
            "cars", "holidays",
        ],
        responses: &[
            "I feel the same, I like that too!",
            "I don't like that very much.",
            "so do I!",
        ],
    },
    Phrase {
        keywords: &[
            "i", "dont", "like", "eating", "drinking", "food", "drink", "toy", "toys", "car",
            "cars", "holidays",
        ],
        responses: &["I don't like that either.", "I think I would like it..?", "me too."],
    },
    Phrase {
        keywords: &["what", "is", "the", "current", "time", "it"],
        responses: &["the current time is {time}.", "right now it is {time}.", "it's {time}."],
    },
    Phrase {
        keywords: &["what", "is", "the", "current", "today", "todays", "date", "it"],
        responses: &["the current date is {today}.", "it is {today}."],
    },
    Phrase {
        keywords: &["what", "is", "the", "current", "today", "todays", "day", "it"],
        responses: &["the current day is {todayday}.", "today is {todayday}."],
    },
];

const SILENCE: &[&str] = &[
    "why you no speak to me???",
    "you are not saying anything!",
    "that's empty...",
    "are you giving me the silent treatment?",
];

const UNKNOWN: &[&str] = &[
    "I don't understand.",
    "I don't know what you mean.",
    "I can't answer that.",
    "I have no reply.",
    "please ask me something else.",
    "erm...",
    "huh?",
    "next question?",
    "hmmm...",
];

const OPENERS: &[&str] = &[
    "hi, how are you?",
    "would you like to chat?",
    "do you need something?",
    "I'm here if you would like to talk?",
    "please ask me a question.",
    "please talk to me!",
    "hey there!",
];

/// A phrase with this many times more keywords than the request has words
/// is too broad to count as a match.
const MAX_SPREAD: usize = 6;

/// Lowercase the request, drop punctuation and split it into distinct words
pub(crate) fn tokenize(request: &str) -> HashSet<String> {
    request
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation() && *c != '’')
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Phrase sharing the most keywords with the request
///
/// Ties go to the phrase listed first.
fn best_match(words: &HashSet<String>) -> Option<&'static Phrase> {
    let mut best: Option<(&'static Phrase, usize)> = None;

    for phrase in PHRASES {
        let overlap = phrase
            .keywords
            .iter()
            .filter(|keyword| words.contains(**keyword))
            .count();

        if overlap > 0 && best.map_or(true, |(_, top)| overlap > top) {
            best = Some((phrase, overlap));
        }
    }

    let (phrase, _) = best?;
    (phrase.keywords.len() / words.len() < MAX_SPREAD).then_some(phrase)
}

/// Pick a response for the request
///
/// Placeholders in the chosen response are filled in from `now`.
pub(crate) fn respond<R: Rng + ?Sized>(request: &str, now: DateTime<Local>, rng: &mut R) -> String {
    let words = tokenize(request);
    if words.is_empty() {
        return pick(SILENCE, rng).to_string();
    }

    match best_match(&words) {
        Some(phrase) => render(pick(phrase.responses, rng), now),
        None => pick(UNKNOWN, rng).to_string(),
    }
}

/// A random conversation opener
pub(crate) fn opener<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    pick(OPENERS, rng)
}

fn pick<R: Rng + ?Sized>(choices: &'static [&'static str], rng: &mut R) -> &'static str {
    choices.choose(rng).copied().unwrap_or_default()
}

/// Replace `{time}`, `{today}` and `{todayday}`
pub(crate) fn render(response: &str, now: DateTime<Local>) -> String {
    if !response.contains('{') {
        return response.to_string();
    }

    response
        .replace("{time}", &now.format("%H:%M").to_string())
        .replace("{todayday}", &now.format("%A").to_string())
        .replace("{today}", &now.format("%A, %-d %B %Y").to_string())
}
