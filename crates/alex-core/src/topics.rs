//! Topic names exchanged with the agent.
//!
//! Strings must match the agent's firmware verbatim.

pub const AUTH_RESPONSE: &str = "/user2/0";
pub const NOTE_STATUS: &str = "/note/status";
pub const NOTE_RESULT: &str = "gacor/1";
pub const DASHBOARD_STATE: &str = "alex/dashboard/state";
pub const DASHBOARD_RESPONSE: &str = "dashboard/response";
pub const HISTORY: &str = "history/1";
pub const MEMORY_ACTIVITY_RESPONSE: &str = "memory/activity/response";
pub const MEMORY_STATS_RESPONSE: &str = "memory/stats/response";
pub const MEMORY_BASE_RESPONSE: &str = "memory/base/response";
pub const MEMORY_CONTEXT_RESPONSE: &str = "memory/context/response";
pub const AGENT_STATUS: &str = "/agent/status";
pub const VOICE_LIST_RESPONSE: &str = "agent/voice/list/response";
pub const VOICE_STATUS: &str = "agent/voice/status";
pub const SUMMARY_REALTIME: &str = "agent/summary/realtime";
pub const BATTERY_RESPONSE: &str = "device/battery/response";

/// Subscribed once per successful connect, in this order.
pub const SUBSCRIBED: [&str; 15] = [
    AUTH_RESPONSE,
    NOTE_STATUS,
    NOTE_RESULT,
    DASHBOARD_STATE,
    DASHBOARD_RESPONSE,
    HISTORY,
    MEMORY_ACTIVITY_RESPONSE,
    MEMORY_STATS_RESPONSE,
    MEMORY_BASE_RESPONSE,
    MEMORY_CONTEXT_RESPONSE,
    AGENT_STATUS,
    VOICE_LIST_RESPONSE,
    VOICE_STATUS,
    SUMMARY_REALTIME,
    BATTERY_RESPONSE,
];

pub const DASHBOARD_REQUEST: &str = "dashboard/request";
pub const DASHBOARD_STATE_REQUEST: &str = "alex/dashboard/state/request";
pub const BATTERY_REQUEST: &str = "device/battery/request";
pub const AGENT_CONTROL: &str = "/agent/1";
pub const NOTE_CONTROL: &str = "/note/1";
pub const MEMORY_BASE_REQUEST: &str = "memory/base/request";
pub const MEMORY_ACTIVITY_SEARCH: &str = "memory/activity/search";
pub const AUTH_REQUEST: &str = "/user1/0";
pub const VOICE_LIST_REQUEST: &str = "agent/voice/list";
pub const VOICE_SET: &str = "agent/voice/set";

pub mod commands {
    pub const AGENT_ON: &str = "AGENTON";
    pub const AGENT_OFF: &str = "AGENTOFF";
    pub const NOTE_ON: &str = "NOTEON";
    pub const NOTE_OFF: &str = "NOTEOFF";
    pub const GET: &str = "get";
    pub const ONE: &str = "1";
    pub const SEARCH_ALL: &str = "all";
}

/// An integration the agent can start an OAuth flow for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Integration {
    pub name: &'static str,
    pub command: &'static str,
}

pub const INTEGRATIONS: [Integration; 4] = [
    Integration {
        name: "Gmail",
        command: "AUTH:GMAIL",
    },
    Integration {
        name: "Google Calendar",
        command: "AUTH:CALENDAR",
    },
    Integration {
        name: "Google Drive",
        command: "AUTH:DRIVE",
    },
    Integration {
        name: "Spotify",
        command: "AUTH:SPOTIFY",
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn subscription_list_has_no_duplicates() {
        let unique: HashSet<&str> = SUBSCRIBED.iter().copied().collect();
        assert_eq!(unique.len(), SUBSCRIBED.len());
    }

    #[test]
    fn request_topics_are_not_subscribed_except_history() {
        for topic in [
            DASHBOARD_REQUEST,
            DASHBOARD_STATE_REQUEST,
            BATTERY_REQUEST,
            AGENT_CONTROL,
            NOTE_CONTROL,
            MEMORY_BASE_REQUEST,
            MEMORY_ACTIVITY_SEARCH,
            AUTH_REQUEST,
            VOICE_LIST_REQUEST,
            VOICE_SET,
        ] {
            assert!(!SUBSCRIBED.contains(&topic), "{topic} is subscribed");
        }
        assert!(SUBSCRIBED.contains(&HISTORY));
    }
}
