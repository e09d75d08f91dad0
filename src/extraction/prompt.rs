//! Prompt construction for event extraction.
//!
//! Output order is fixed: one system instruction, two few-shot exchanges
//! whose dates are derived from the reference date, then the user's text.
//! Nothing here touches the network or the clock.

use chrono::{Days, NaiveDate};
use serde_json::{json, Map, Value};

use crate::clock::PromptContext;
use crate::providers::Message;

use super::parser::EVENTS_KEY;
use super::ExtractionMode;

/// Phrase → time-of-day defaults handed to the model verbatim.
pub const TIME_DEFAULTS_TABLE: &str = "\
| Phrase | Resolve to |
|---|---|
| \"around 4pm\" | start 16:00 |
| \"by 3pm\" | a 1-hour window ending at 15:00 (14:00-15:00) |
| \"early morning\" | start 08:00 |
| \"morning\" | start 09:00 |
| \"noon\" / \"lunch\" | start 12:00 |
| \"afternoon\" | start 14:00 |
| \"evening\" / \"tonight\" | start 18:00 |
| \"this weekend\" | the upcoming Saturday, 10:00-11:00 |
| \"end of the month\" | the last calendar day of the current month, 17:00-18:00 |
| \"early next week\" | Monday or Tuesday of the upcoming week |
| \"late next week\" | Thursday or Friday of the upcoming week |
| no end time stated | end = start + 1 hour |
| a date but no time of day | start 09:00 |";

/// Build the full message sequence for one extraction call.
pub fn build_messages(text: &str, mode: ExtractionMode, context: &PromptContext) -> Vec<Message> {
    let mut messages = Vec::with_capacity(6);
    messages.push(Message::system(system_instruction(mode, context)));
    for (example_text, example_json) in few_shot_examples(mode, context) {
        messages.push(Message::user(example_text));
        messages.push(Message::assistant(example_json));
    }
    messages.push(Message::user(text));
    messages
}

/// System instruction for a mode.
pub fn system_instruction(mode: ExtractionMode, context: &PromptContext) -> String {
    let PromptContext {
        reference_date,
        reference_time,
        timezone_offset,
        timezone_name,
    } = context;
    let weekday = reference_date.format("%A");
    let reference_time = reference_time.format("%H:%M");

    let shape = match mode {
        ExtractionMode::Single => format!(
            "Output exactly one JSON object describing the event, with these keys:\n\
             - \"summary\": short event title (string, required)\n\
             - \"description\": extra details, or null\n\
             - \"location\": where it happens, or null\n\
             - \"start\": ISO-8601 date-time with offset, e.g. \"{reference_date}T09:00:00{timezone_offset}\"\n\
             - \"end\": ISO-8601 date-time with offset\n\
             If the text mentions several events, describe only the first one."
        ),
        ExtractionMode::Multiple => format!(
            "Output exactly one JSON object with a single key \"{EVENTS_KEY}\" whose value is an \
             array of event objects. Each event object has these keys:\n\
             - \"summary\": short event title (string, required)\n\
             - \"description\": extra details, or null\n\
             - \"location\": where it happens, or null\n\
             - \"start\": ISO-8601 date-time with offset, e.g. \"{reference_date}T09:00:00{timezone_offset}\"\n\
             - \"end\": ISO-8601 date-time with offset\n\
             List the events in the order they appear in the text.\n\
             Every distinct event gets its own object. Never merge events that differ in date, \
             time or location into one object, even if they share a title.\n\
             Never collapse a list of several events into a single-element array.\n\
             If the text contains no events, output {{\"{EVENTS_KEY}\": []}}. An empty array is \
             the correct answer in that case, not an error."
        ),
    };

    format!(
        "You convert natural-language descriptions of events into structured calendar data.\n\
         \n\
         Reference context:\n\
         - Today is {weekday}, {reference_date}.\n\
         - The current time is {reference_time}.\n\
         - The user's timezone is {timezone_name} (UTC offset {timezone_offset}).\n\
         \n\
         Output format:\n\
         Always respond with a single JSON object and nothing else: no prose, no Markdown.\n\
         {shape}\n\
         \n\
         Date and time rules:\n\
         - Every timestamp must be ISO-8601 with the explicit offset {timezone_offset}, \
           formatted YYYY-MM-DDTHH:MM:SS{timezone_offset}. Never emit bare or UTC (\"Z\") timestamps.\n\
         - Resolve every relative reference (\"today\", \"tomorrow\", \"next Friday\", \
           \"next week\") to a concrete calendar date using the reference context. \
           Relative phrases must never appear in a timestamp.\n\
         - The end must be strictly after the start.\n\
         - Use this table of defaults when the text is vague:\n\
         {TIME_DEFAULTS_TABLE}\n\
         - If the date or time of an event cannot be determined at all, still output the \
           event: start today ({reference_date}) at 09:00, end at 10:00, and say in the \
           description that the date/time was ambiguous. Never drop an event for this reason."
    )
}

/// Two fixed example exchanges, dated relative to the reference date.
pub fn few_shot_examples(mode: ExtractionMode, context: &PromptContext) -> [(String, String); 2] {
    let offset = &context.timezone_offset;
    let tomorrow = days_after(context.reference_date, 1);
    let day_after = days_after(context.reference_date, 2);
    let at = |date: NaiveDate, time: &str| format!("{date}T{time}:00{offset}");

    let coffee = event_json(
        "Coffee with Alex",
        None,
        Some("Blue Bottle"),
        &at(tomorrow, "10:00"),
        &at(tomorrow, "11:00"),
    );
    let review = event_json(
        "Project review",
        Some("Quarterly project review"),
        None,
        &at(day_after, "15:00"),
        &at(day_after, "16:30"),
    );

    match mode {
        ExtractionMode::Single => [
            (
                "Coffee with Alex tomorrow at 10am at Blue Bottle".to_owned(),
                coffee.to_string(),
            ),
            (
                "Quarterly project review the day after tomorrow from 3pm to 4:30pm".to_owned(),
                review.to_string(),
            ),
        ],
        ExtractionMode::Multiple => [
            (
                "Coffee with Alex tomorrow at 10am at Blue Bottle, and the quarterly project \
                 review the day after tomorrow from 3pm to 4:30pm"
                    .to_owned(),
                envelope(vec![coffee, review]).to_string(),
            ),
            (
                "Just a note that the weather has been lovely lately.".to_owned(),
                envelope(Vec::new()).to_string(),
            ),
        ],
    }
}

fn event_json(
    summary: &str,
    description: Option<&str>,
    location: Option<&str>,
    start: &str,
    end: &str,
) -> Value {
    json!({
        "summary": summary,
        "description": description,
        "location": location,
        "start": start,
        "end": end,
    })
}

fn envelope(events: Vec<Value>) -> Value {
    let mut map = Map::new();
    map.insert(EVENTS_KEY.to_owned(), Value::Array(events));
    Value::Object(map)
}

fn days_after(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(date)
}
