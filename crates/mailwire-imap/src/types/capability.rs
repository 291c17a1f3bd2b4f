//! Server capabilities and response status.

/// Response status from a tagged response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command failed (protocol/syntax error).
    Bad,
    /// Server greeting (pre-authenticated).
    PreAuth,
    /// Server is closing connection.
    Bye,
}

impl Status {
    /// Returns true if this is a successful status.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }
}

/// A protocol extension the server can advertise.
///
/// Each tag owns exactly one bit of a [`CapabilitySet`](super::CapabilitySet).
/// The discriminant *is* the bit index and is never renumbered, so cached
/// snapshots stay comparable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Capability {
    /// `IMAP4` (RFC 1730)
    Imap4 = 0,
    /// `IMAP4rev1` (RFC 3501)
    Imap4Rev1 = 1,
    /// STATUS command support
    Status = 2,
    /// QUOTA extension (RFC 2087)
    Quota = 3,
    /// LITERAL+ extension (RFC 2088)
    LiteralPlus = 4,
    /// IDLE command support (RFC 2177)
    Idle = 5,
    /// NAMESPACE command support (RFC 2342)
    Namespace = 6,
    /// CHILDREN extension (RFC 3348)
    Children = 7,
    /// LOGIN disabled (RFC 3501)
    LoginDisabled = 8,
    /// STARTTLS support (RFC 3501)
    StartTls = 9,
    /// MULTIAPPEND extension (RFC 3502)
    MultiAppend = 10,
    /// BINARY content extension (RFC 3516)
    Binary = 11,
    /// UNSELECT extension (RFC 3691)
    Unselect = 12,
    /// UIDPLUS extension (RFC 4315)
    UidPlus = 13,
    /// CATENATE extension (RFC 4469)
    Catenate = 14,
    /// CONDSTORE (RFC 4551, RFC 7162)
    CondStore = 15,
    /// ESEARCH extension (RFC 4731)
    ESearch = 16,
    /// SASL-IR initial response (RFC 4959)
    SaslIr = 17,
    /// COMPRESS extension (RFC 4978)
    Compress = 18,
    /// WITHIN search extension (RFC 5032)
    Within = 19,
    /// ENABLE command (RFC 5161)
    Enable = 20,
    /// QRESYNC (RFC 5162, RFC 7162)
    QuickResync = 21,
    /// SORT extension (RFC 5256)
    Sort = 22,
    /// THREAD extension (RFC 5256)
    Thread = 23,
    /// LIST-EXTENDED (RFC 5258)
    ListExtended = 24,
    /// CONVERT extension (RFC 5259)
    Convert = 25,
    /// ESORT extension (RFC 5267)
    ESort = 26,
    /// CONTEXT extension (RFC 5267)
    Context = 27,
    /// METADATA extension (RFC 5464)
    Metadata = 28,
    /// NOTIFY extension (RFC 5465)
    Notify = 29,
    /// FILTERS extension (RFC 5466)
    Filters = 30,
    /// LIST-STATUS extension (RFC 5819)
    ListStatus = 31,
    /// SPECIAL-USE mailboxes (RFC 6154)
    SpecialUse = 32,
    /// MULTISEARCH extension (RFC 6237)
    MultiSearch = 33,
    /// MOVE extension (RFC 6851)
    Move = 34,
    /// Gmail XLIST
    XList = 35,
    /// Gmail `X-GM-EXT-1`
    GmailExt1 = 36,
    /// `IMAP4rev2` (RFC 9051)
    Imap4Rev2 = 37,
    /// LITERAL- extension (RFC 7888)
    LiteralMinus = 38,
    /// UTF8=ACCEPT (RFC 6855)
    Utf8Accept = 39,
    /// ID extension (RFC 2971)
    Id = 40,
    /// OBJECTID extension (RFC 8474)
    ObjectId = 41,
    /// SAVEDATE extension (RFC 8514)
    SaveDate = 42,
    /// PREVIEW extension (RFC 8970)
    Preview = 43,
    /// STATUS=SIZE (RFC 8438)
    StatusSize = 44,
    /// APPENDLIMIT extension (RFC 7889)
    AppendLimit = 45,
    /// Yahoo `XYMHIGHESTMODSEQ`
    YahooHighestModSeq = 63,
}

impl Capability {
    /// Every assigned tag, in bit order.
    pub const ALL: [Self; 47] = [
        Self::Imap4,
        Self::Imap4Rev1,
        Self::Status,
        Self::Quota,
        Self::LiteralPlus,
        Self::Idle,
        Self::Namespace,
        Self::Children,
        Self::LoginDisabled,
        Self::StartTls,
        Self::MultiAppend,
        Self::Binary,
        Self::Unselect,
        Self::UidPlus,
        Self::Catenate,
        Self::CondStore,
        Self::ESearch,
        Self::SaslIr,
        Self::Compress,
        Self::Within,
        Self::Enable,
        Self::QuickResync,
        Self::Sort,
        Self::Thread,
        Self::ListExtended,
        Self::Convert,
        Self::ESort,
        Self::Context,
        Self::Metadata,
        Self::Notify,
        Self::Filters,
        Self::ListStatus,
        Self::SpecialUse,
        Self::MultiSearch,
        Self::Move,
        Self::XList,
        Self::GmailExt1,
        Self::Imap4Rev2,
        Self::LiteralMinus,
        Self::Utf8Accept,
        Self::Id,
        Self::ObjectId,
        Self::SaveDate,
        Self::Preview,
        Self::StatusSize,
        Self::AppendLimit,
        Self::YahooHighestModSeq,
    ];

    /// Returns the bit index of this tag.
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Returns the single-bit mask for this tag.
    #[must_use]
    pub const fn bit(self) -> u64 {
        1u64 << self.index()
    }

    /// Looks up the tag assigned to a bit index.
    ///
    /// Returns `None` for unassigned or out-of-range positions.
    #[must_use]
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|cap| cap.index() == index)
    }

    /// Parses a capability atom, ignoring case.
    ///
    /// Returns `None` for anything not modeled as a tag, including
    /// parameterized atoms such as `AUTH=PLAIN`; see
    /// [`CapabilitySet::from_tokens`](super::CapabilitySet::from_tokens) for
    /// the families that map onto a base tag.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.to_ascii_uppercase();
        let cap = match upper.as_str() {
            "IMAP4" => Self::Imap4,
            "IMAP4REV1" => Self::Imap4Rev1,
            "IMAP4REV2" => Self::Imap4Rev2,
            "STATUS" => Self::Status,
            "QUOTA" => Self::Quota,
            "LITERAL+" => Self::LiteralPlus,
            "LITERAL-" => Self::LiteralMinus,
            "IDLE" => Self::Idle,
            "NAMESPACE" => Self::Namespace,
            "CHILDREN" => Self::Children,
            "LOGINDISABLED" => Self::LoginDisabled,
            "STARTTLS" => Self::StartTls,
            "MULTIAPPEND" => Self::MultiAppend,
            "BINARY" => Self::Binary,
            "UNSELECT" => Self::Unselect,
            "UIDPLUS" => Self::UidPlus,
            "CATENATE" => Self::Catenate,
            "CONDSTORE" => Self::CondStore,
            "ESEARCH" => Self::ESearch,
            "SASL-IR" => Self::SaslIr,
            "COMPRESS" => Self::Compress,
            "WITHIN" => Self::Within,
            "ENABLE" => Self::Enable,
            "QRESYNC" => Self::QuickResync,
            "SORT" => Self::Sort,
            "THREAD" => Self::Thread,
            "LIST-EXTENDED" => Self::ListExtended,
            "CONVERT" => Self::Convert,
            "ESORT" => Self::ESort,
            "CONTEXT" => Self::Context,
            "METADATA" => Self::Metadata,
            "NOTIFY" => Self::Notify,
            "FILTERS" => Self::Filters,
            "LIST-STATUS" => Self::ListStatus,
            "SPECIAL-USE" => Self::SpecialUse,
            "MULTISEARCH" => Self::MultiSearch,
            "MOVE" => Self::Move,
            "XLIST" => Self::XList,
            "X-GM-EXT-1" => Self::GmailExt1,
            "UTF8=ACCEPT" => Self::Utf8Accept,
            "ID" => Self::Id,
            "OBJECTID" => Self::ObjectId,
            "SAVEDATE" => Self::SaveDate,
            "PREVIEW" => Self::Preview,
            "STATUS=SIZE" => Self::StatusSize,
            "APPENDLIMIT" => Self::AppendLimit,
            "XYMHIGHESTMODSEQ" => Self::YahooHighestModSeq,
            _ => return None,
        };
        Some(cap)
    }

    /// Returns the canonical wire spelling of this tag.
    #[must_use]
    pub const fn atom(self) -> &'static str {
        match self {
            Self::Imap4 => "IMAP4",
            Self::Imap4Rev1 => "IMAP4rev1",
            Self::Imap4Rev2 => "IMAP4rev2",
            Self::Status => "STATUS",
            Self::Quota => "QUOTA",
            Self::LiteralPlus => "LITERAL+",
            Self::LiteralMinus => "LITERAL-",
            Self::Idle => "IDLE",
            Self::Namespace => "NAMESPACE",
            Self::Children => "CHILDREN",
            Self::LoginDisabled => "LOGINDISABLED",
            Self::StartTls => "STARTTLS",
            Self::MultiAppend => "MULTIAPPEND",
            Self::Binary => "BINARY",
            Self::Unselect => "UNSELECT",
            Self::UidPlus => "UIDPLUS",
            Self::Catenate => "CATENATE",
            Self::CondStore => "CONDSTORE",
            Self::ESearch => "ESEARCH",
            Self::SaslIr => "SASL-IR",
            Self::Compress => "COMPRESS",
            Self::Within => "WITHIN",
            Self::Enable => "ENABLE",
            Self::QuickResync => "QRESYNC",
            Self::Sort => "SORT",
            Self::Thread => "THREAD",
            Self::ListExtended => "LIST-EXTENDED",
            Self::Convert => "CONVERT",
            Self::ESort => "ESORT",
            Self::Context => "CONTEXT",
            Self::Metadata => "METADATA",
            Self::Notify => "NOTIFY",
            Self::Filters => "FILTERS",
            Self::ListStatus => "LIST-STATUS",
            Self::SpecialUse => "SPECIAL-USE",
            Self::MultiSearch => "MULTISEARCH",
            Self::Move => "MOVE",
            Self::XList => "XLIST",
            Self::GmailExt1 => "X-GM-EXT-1",
            Self::Utf8Accept => "UTF8=ACCEPT",
            Self::Id => "ID",
            Self::ObjectId => "OBJECTID",
            Self::SaveDate => "SAVEDATE",
            Self::Preview => "PREVIEW",
            Self::StatusSize => "STATUS=SIZE",
            Self::AppendLimit => "APPENDLIMIT",
            Self::YahooHighestModSeq => "XYMHIGHESTMODSEQ",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.atom())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    mod status_tests {
        use super::*;

        #[test]
        fn is_ok_for_ok() {
            assert!(Status::Ok.is_ok());
        }

        #[test]
        fn is_ok_for_preauth() {
            assert!(Status::PreAuth.is_ok());
        }

        #[test]
        fn is_ok_false_for_failures() {
            assert!(!Status::No.is_ok());
            assert!(!Status::Bad.is_ok());
            assert!(!Status::Bye.is_ok());
        }
    }

    mod capability_parse_tests {
        use super::*;

        #[test]
        fn parse_is_case_insensitive() {
            assert_eq!(Capability::parse("IMAP4REV1"), Some(Capability::Imap4Rev1));
            assert_eq!(Capability::parse("imap4rev1"), Some(Capability::Imap4Rev1));
            assert_eq!(Capability::parse("Idle"), Some(Capability::Idle));
            assert_eq!(Capability::parse("x-gm-ext-1"), Some(Capability::GmailExt1));
        }

        #[test]
        fn parse_qresync() {
            assert_eq!(Capability::parse("QRESYNC"), Some(Capability::QuickResync));
        }

        #[test]
        fn parse_literal_variants() {
            assert_eq!(Capability::parse("LITERAL+"), Some(Capability::LiteralPlus));
            assert_eq!(Capability::parse("LITERAL-"), Some(Capability::LiteralMinus));
        }

        #[test]
        fn parse_unknown_is_none() {
            assert_eq!(Capability::parse("XSOMETHING"), None);
            assert_eq!(Capability::parse(""), None);
        }

        #[test]
        fn parse_auth_is_not_a_tag() {
            assert_eq!(Capability::parse("AUTH=PLAIN"), None);
        }

        #[test]
        fn atom_round_trips_through_parse() {
            for cap in Capability::ALL {
                assert_eq!(Capability::parse(cap.atom()), Some(cap), "{cap:?}");
            }
        }
    }

    mod capability_bit_tests {
        use super::*;

        #[test]
        fn reference_tags_fill_the_low_bits() {
            for (i, cap) in Capability::ALL.iter().take(37).enumerate() {
                assert_eq!(usize::from(cap.index()), i);
            }
        }

        #[test]
        fn provider_tag_sits_on_highest_bit() {
            assert_eq!(Capability::YahooHighestModSeq.index(), 63);
            assert_eq!(Capability::YahooHighestModSeq.bit(), 1u64 << 63);
        }

        #[test]
        fn bits_never_alias() {
            let mut seen = 0u64;
            for cap in Capability::ALL {
                assert_eq!(seen & cap.bit(), 0, "{cap:?} aliases another tag");
                seen |= cap.bit();
            }
            assert_eq!(seen.count_ones() as usize, Capability::ALL.len());
        }

        #[test]
        fn from_index_inverts_index() {
            for cap in Capability::ALL {
                assert_eq!(Capability::from_index(cap.index()), Some(cap));
            }
            assert_eq!(Capability::from_index(50), None);
            assert_eq!(Capability::from_index(64), None);
        }

        #[test]
        fn all_is_sorted_by_bit() {
            assert!(Capability::ALL.windows(2).all(|w| w[0].index() < w[1].index()));
        }
    }

    mod capability_display_tests {
        use super::*;

        #[test]
        fn display_imap4rev1() {
            assert_eq!(format!("{}", Capability::Imap4Rev1), "IMAP4rev1");
        }

        #[test]
        fn display_starttls() {
            assert_eq!(Capability::StartTls.to_string(), "STARTTLS");
        }
    }
}
