// SPDX-License-Identifier: MIT

//! The opcode catalog (`spec.md` §6), generated from one table so the byte
//! value, display name, and capability category can't drift apart.

/// Category an opcode belongs to, used by the permission engine's
/// capability mapping (`spec.md` §4.E) and by audit/recording category
/// tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpcodeCategory {
    Control,
    Llm,
    Fs,
    Exec,
    Lifecycle,
    Ipc,
    State,
    Perms,
    Http,
    Events,
    Recording,
    Audit,
    AsyncQueue,
    Tunnel,
    Metrics,
    Report,
}

macro_rules! opcode_table {
    ($( $byte:literal => $variant:ident, $name:literal, $category:ident ;)+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $( $variant = $byte, )+
        }

        impl Opcode {
            pub const fn name(self) -> &'static str {
                match self {
                    $( Opcode::$variant => $name, )+
                }
            }

            pub const fn category(self) -> OpcodeCategory {
                match self {
                    $( Opcode::$variant => OpcodeCategory::$category, )+
                }
            }

            /// Reverse of [`Opcode::name`], used where an opcode arrives as
            /// a name rather than a byte (e.g. the tunnel helper's relayed
            /// `syscall` events).
            pub fn from_name(name: &str) -> Option<Opcode> {
                match name {
                    $( $name => Some(Opcode::$variant), )+
                    _ => None,
                }
            }
        }

        impl TryFrom<u8> for Opcode {
            type Error = u8;

            fn try_from(byte: u8) -> Result<Self, u8> {
                match byte {
                    $( $byte => Ok(Opcode::$variant), )+
                    other => Err(other),
                }
            }
        }

        /// Every opcode the kernel recognizes, in table order. Backs
        /// `HELLO`'s `capabilities` field.
        pub const ALL_OPCODES: &[Opcode] = &[ $( Opcode::$variant, )+ ];
    };
}

opcode_table! {
    0x00 => Noop, "NOOP", Control;
    0x01 => Think, "THINK", Llm;
    0x02 => Exec, "EXEC", Exec;
    0x03 => Read, "READ", Fs;
    0x04 => Write, "WRITE", Fs;

    0x10 => Spawn, "SPAWN", Lifecycle;
    0x11 => Kill, "KILL", Lifecycle;
    0x12 => List, "LIST", Lifecycle;
    0x14 => Pause, "PAUSE", Lifecycle;
    0x15 => Resume, "RESUME", Lifecycle;

    0x20 => Send, "SEND", Ipc;
    0x21 => Recv, "RECV", Ipc;
    0x22 => Broadcast, "BROADCAST", Ipc;
    0x23 => Register, "REGISTER", Ipc;

    0x30 => Store, "STORE", State;
    0x31 => Fetch, "FETCH", State;
    0x32 => Delete, "DELETE", State;
    0x33 => Keys, "KEYS", State;

    0x40 => GetPerms, "GET_PERMS", Perms;
    0x41 => SetPerms, "SET_PERMS", Perms;

    0x50 => Http, "HTTP", Http;

    0x60 => Subscribe, "SUBSCRIBE", Events;
    0x61 => Unsubscribe, "UNSUBSCRIBE", Events;
    0x62 => PollEvents, "POLL_EVENTS", Events;
    0x63 => Emit, "EMIT", Events;

    0x70 => RecordStart, "RECORD_START", Recording;
    0x71 => RecordStop, "RECORD_STOP", Recording;
    0x72 => RecordStatus, "RECORD_STATUS", Recording;
    0x73 => ReplayStart, "REPLAY_START", Recording;
    0x74 => ReplayStatus, "REPLAY_STATUS", Recording;
    0x75 => GetAuditLog, "GET_AUDIT_LOG", Audit;
    0x76 => SetAuditConfig, "SET_AUDIT_CONFIG", Audit;

    0x80 => AsyncPoll, "ASYNC_POLL", AsyncQueue;

    0xB0 => TunnelConnect, "TUNNEL_CONNECT", Tunnel;
    0xB1 => TunnelDisconnect, "TUNNEL_DISCONNECT", Tunnel;
    0xB2 => TunnelStatus, "TUNNEL_STATUS", Tunnel;
    0xB3 => TunnelListRemotes, "TUNNEL_LIST_REMOTES", Tunnel;
    0xB4 => TunnelConfig, "TUNNEL_CONFIG", Tunnel;

    0xC0 => MetricsSystem, "METRICS_SYSTEM", Metrics;
    0xC1 => MetricsAgent, "METRICS_AGENT", Metrics;
    0xC2 => MetricsCgroup, "METRICS_CGROUP", Metrics;

    0xF0 => LlmReport, "LLM_REPORT", Report;
    0xFE => Hello, "HELLO", Control;
    0xFF => Exit, "EXIT", Control;
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
#[path = "opcode_tests.rs"]
mod tests;
