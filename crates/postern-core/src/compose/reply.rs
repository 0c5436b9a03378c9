//! Replies to received messages.

use super::compose_new;
use crate::config::Config;
use postern_mime::{Mailbox, Message, Part, format_address_list, parse_address_list};
use std::fmt::Write as _;

/// References kept from the end of the original chain, besides the first.
const TRAILING_REFERENCES: usize = 8;

/// Chooses the reply's `To` and `From` values.
///
/// The reply is sent from the first `To` address that belongs to an account.
/// For a group reply the remaining `To` addresses are added to the
/// recipients. If either list cannot be parsed the values are swapped
/// verbatim.
fn choose_recipients(
    original_to: &str,
    original_from: &str,
    group_reply: bool,
    config: &Config,
) -> (String, String) {
    let (Ok(mut recipients), Ok(to_list)) = (
        parse_address_list(original_from),
        parse_address_list(original_to),
    ) else {
        return (original_from.to_string(), original_to.to_string());
    };

    let mut from = original_to.to_string();
    if let Some(i) = to_list.iter().position(|m| config.is_own_address(&m.email)) {
        from = to_list[i].to_string();
        if group_reply {
            recipients.extend(
                to_list
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .map(|(_, m)| m.clone()),
            );
        }
    }

    (format_address_list(&recipients), from)
}

/// Carries the original `Cc` over to a group reply, minus own addresses.
fn reply_cc(original: &Message, config: &Config) -> Option<String> {
    let cc = original.cc()?;
    let list: Vec<Mailbox> = match parse_address_list(cc) {
        Ok(list) => list
            .into_iter()
            .filter(|m| !config.is_own_address(&m.email))
            .collect(),
        Err(_) => return Some(cc.to_string()),
    };
    (!list.is_empty()).then(|| format_address_list(&list))
}

/// Keeps the first reference and the last few, then appends `message_id`.
fn reply_references(original: &Message) -> Vec<String> {
    let references = original.references();
    let mut kept: Vec<String> = Vec::with_capacity(TRAILING_REFERENCES + 2);
    if let Some(first) = references.first() {
        kept.push(first.clone());
        let tail = references.len().saturating_sub(TRAILING_REFERENCES).max(1);
        kept.extend(references[tail..].iter().cloned());
    }
    if let Some(id) = original.message_id().filter(|id| !id.is_empty()) {
        kept.push(id.to_string());
    }
    kept
}

fn reply_subject(subject: &str) -> String {
    let lower = subject.to_lowercase();
    if lower.starts_with("re:") || lower.starts_with("aw:") {
        subject.to_string()
    } else {
        format!("Re: {subject}")
    }
}

/// Builds the quoted body: an attribution line and every `text/plain` line
/// prefixed with `> `.
fn quoted_body(original: &Message) -> String {
    let raw_from = original.from().unwrap_or_default();
    let name = original
        .from_mailboxes()
        .ok()
        .and_then(|list| list.into_iter().next())
        .and_then(|m| m.name)
        .unwrap_or_else(|| raw_from.to_string());
    let date = original.parsed_date().map_or_else(
        || original.date().unwrap_or_default().to_string(),
        |d| d.format("%Y-%m-%d %H:%M").to_string(),
    );

    let mut body = format!("Quoting {name} ({date}):\n");
    for text in original.text_plain_parts() {
        for line in text.lines() {
            let _ = writeln!(body, "> {line}");
        }
    }
    body
}

/// Creates a reply to `original`.
///
/// With `group_reply` the other recipients of the original are kept.
#[must_use]
pub fn compose_reply(original: &Message, group_reply: bool, config: &Config) -> Message {
    let mut reply = compose_new();

    let (to, from) = choose_recipients(
        original.to().unwrap_or_default(),
        original.from().unwrap_or_default(),
        group_reply,
        config,
    );
    reply.headers.set("From", from);
    reply.headers.set("To", to);

    if group_reply {
        if let Some(cc) = reply_cc(original, config) {
            reply.headers.set("Cc", cc);
        }
    }

    if let Some(id) = original.message_id() {
        reply.headers.set("In-Reply-To", id);
    }
    let references = reply_references(original);
    if !references.is_empty() {
        reply.headers.set_all("References", references);
    }

    reply
        .headers
        .set("Subject", reply_subject(original.subject().unwrap_or_default()));

    reply.parts.push(Part::text(quoted_body(original)));
    reply
}
