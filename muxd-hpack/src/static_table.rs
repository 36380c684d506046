//! HPACK static table (RFC 7541 Appendix A).
//!
//! 61 predefined header fields with fixed indices 1 through 61. Index 0 is
//! reserved and never addresses an entry.

/// A static table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticEntry {
    pub name: &'static str,
    pub value: &'static str,
}

/// Number of addressable static entries.
pub const STATIC_TABLE_LEN: u32 = 61;

static STATIC_TABLE: [StaticEntry; 62] = [
    StaticEntry { name: "", value: "" }, // 0 (reserved)
    StaticEntry { name: ":authority", value: "" }, // 1
    StaticEntry { name: ":method", value: "GET" }, // 2
    StaticEntry { name: ":method", value: "POST" }, // 3
    StaticEntry { name: ":path", value: "/" }, // 4
    StaticEntry { name: ":path", value: "/index.html" }, // 5
    StaticEntry { name: ":scheme", value: "http" }, // 6
    StaticEntry { name: ":scheme", value: "https" }, // 7
    StaticEntry { name: ":status", value: "200" }, // 8
    StaticEntry { name: ":status", value: "204" }, // 9
    StaticEntry { name: ":status", value: "206" }, // 10
    StaticEntry { name: ":status", value: "304" }, // 11
    StaticEntry { name: ":status", value: "400" }, // 12
    StaticEntry { name: ":status", value: "404" }, // 13
    StaticEntry { name: ":status", value: "500" }, // 14
    StaticEntry { name: "accept-charset", value: "" }, // 15
    StaticEntry { name: "accept-encoding", value: "gzip, deflate" }, // 16
    StaticEntry { name: "accept-language", value: "" }, // 17
    StaticEntry { name: "accept-ranges", value: "" }, // 18
    StaticEntry { name: "accept", value: "" }, // 19
    StaticEntry { name: "access-control-allow-origin", value: "" }, // 20
    StaticEntry { name: "age", value: "" }, // 21
    StaticEntry { name: "allow", value: "" }, // 22
    StaticEntry { name: "authorization", value: "" }, // 23
    StaticEntry { name: "cache-control", value: "" }, // 24
    StaticEntry { name: "content-disposition", value: "" }, // 25
    StaticEntry { name: "content-encoding", value: "" }, // 26
    StaticEntry { name: "content-language", value: "" }, // 27
    StaticEntry { name: "content-length", value: "" }, // 28
    StaticEntry { name: "content-location", value: "" }, // 29
    StaticEntry { name: "content-range", value: "" }, // 30
    StaticEntry { name: "content-type", value: "" }, // 31
    StaticEntry { name: "cookie", value: "" }, // 32
    StaticEntry { name: "date", value: "" }, // 33
    StaticEntry { name: "etag", value: "" }, // 34
    StaticEntry { name: "expect", value: "" }, // 35
    StaticEntry { name: "expires", value: "" }, // 36
    StaticEntry { name: "from", value: "" }, // 37
    StaticEntry { name: "host", value: "" }, // 38
    StaticEntry { name: "if-match", value: "" }, // 39
    StaticEntry { name: "if-modified-since", value: "" }, // 40
    StaticEntry { name: "if-none-match", value: "" }, // 41
    StaticEntry { name: "if-range", value: "" }, // 42
    StaticEntry { name: "if-unmodified-since", value: "" }, // 43
    StaticEntry { name: "last-modified", value: "" }, // 44
    StaticEntry { name: "link", value: "" }, // 45
    StaticEntry { name: "location", value: "" }, // 46
    StaticEntry { name: "max-forwards", value: "" }, // 47
    StaticEntry { name: "proxy-authenticate", value: "" }, // 48
    StaticEntry { name: "proxy-authorization", value: "" }, // 49
    StaticEntry { name: "range", value: "" }, // 50
    StaticEntry { name: "referer", value: "" }, // 51
    StaticEntry { name: "refresh", value: "" }, // 52
    StaticEntry { name: "retry-after", value: "" }, // 53
    StaticEntry { name: "server", value: "" }, // 54
    StaticEntry { name: "set-cookie", value: "" }, // 55
    StaticEntry { name: "strict-transport-security", value: "" }, // 56
    StaticEntry { name: "transfer-encoding", value: "" }, // 57
    StaticEntry { name: "user-agent", value: "" }, // 58
    StaticEntry { name: "vary", value: "" }, // 59
    StaticEntry { name: "via", value: "" }, // 60
    StaticEntry { name: "www-authenticate", value: "" }, // 61
];

/// Look up a static entry; index 0 and indices past 61 return `None`.
pub fn get(index: u32) -> Option<&'static StaticEntry> {
    if index == 0 {
        return None;
    }
    STATIC_TABLE.get(index as usize)
}
