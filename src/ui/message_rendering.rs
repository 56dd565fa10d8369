//! Plain-text rendering of a message list.
//!
//! Consecutive messages from one sender show the name once, and a date
//! separator precedes the first message of each day.

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::message::Message;

const PENDING_TIME: &str = "--:--";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageListElement {
    DateSeparator(String),
    Message {
        time: String,
        sender: Option<String>,
        content: String,
    },
}

pub fn build_message_list_elements(messages: &[Message]) -> Vec<MessageListElement> {
    let mut elements = Vec::new();
    let mut prev_date: Option<NaiveDate> = None;
    let mut prev_sender: Option<&str> = None;

    for message in messages {
        let date = message.timestamp.map(|at| at.date_naive());

        if let Some(day) = date.filter(|day| prev_date != Some(*day)) {
            elements.push(MessageListElement::DateSeparator(format_date(day)));
            prev_sender = None;
        }

        let sender_name = message.sender_name.as_str();
        let sender = (prev_sender != Some(sender_name)).then(|| sender_name.to_owned());

        elements.push(MessageListElement::Message {
            time: format_time(message.timestamp),
            sender,
            content: message.content.clone(),
        });

        prev_date = date.or(prev_date);
        prev_sender = Some(sender_name);
    }

    elements
}

pub fn element_to_line(element: &MessageListElement) -> String {
    match element {
        MessageListElement::DateSeparator(date) => format!("--- {date} ---"),
        MessageListElement::Message {
            time,
            sender: Some(sender),
            content,
        } => format!("{time} {sender}: {content}"),
        MessageListElement::Message {
            time,
            sender: None,
            content,
        } => format!("{time}   {content}"),
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string()
}

fn format_time(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp
        .map(|at| at.format("%H:%M").to_string())
        .unwrap_or_else(|| PENDING_TIME.to_owned())
}
