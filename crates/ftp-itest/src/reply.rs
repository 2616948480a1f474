//! Control-connection reply parsing.

/// One complete server reply, possibly spanning several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    /// Text of every line with the status prefix removed.
    pub lines: Vec<String>,
}

impl Reply {
    pub fn message(&self) -> String {
        self.lines.join("\n")
    }

    /// 1xx: more replies follow for this command.
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// 2xx
    pub fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// 3xx: the server waits for the next command of a sequence.
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }
}

/// Split `NNN text` / `NNN-text` into code, whether it ends the reply, and
/// text.
pub fn parse_status_line(line: &str) -> Option<(u16, bool, &str)> {
    let digits = line.get(..3)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let code = digits.parse().ok()?;
    match line.as_bytes().get(3) {
        None => Some((code, true, "")),
        Some(b' ') => Some((code, true, &line[4..])),
        Some(b'-') => Some((code, false, &line[4..])),
        Some(_) => None,
    }
}

/// Data port from a `227` reply text such as
/// `Entering Passive Mode (127,0,0,1,117,49).`
pub fn parse_pasv(text: &str) -> Option<u16> {
    let fields = match (text.find('('), text.rfind(')')) {
        (Some(open), Some(close)) if open < close => &text[open + 1..close],
        _ => text.rsplit(' ').next()?,
    };

    let numbers: Vec<u8> = fields
        .split(',')
        .map(|field| field.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .ok()?;
    match numbers[..] {
        [_, _, _, _, high, low] => Some((u16::from(high) << 8) | u16::from(low)),
        _ => None,
    }
}

/// Directory from a `257` reply text: the first quoted string, with `""`
/// standing for a literal quote.
pub fn parse_quoted_path(text: &str) -> Option<String> {
    let start = text.find('"')? + 1;
    let mut path = String::new();
    let mut chars = text[start..].chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                chars.next();
                path.push('"');
            } else {
                return Some(path);
            }
        } else {
            path.push(c);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines() {
        assert_eq!(parse_status_line("220 ready"), Some((220, true, "ready")));
        assert_eq!(
            parse_status_line("220-Welcome to Pure-FTPd"),
            Some((220, false, "Welcome to Pure-FTPd"))
        );
        assert_eq!(parse_status_line("226"), Some((226, true, "")));
        assert_eq!(parse_status_line("  Welcome"), None);
        assert_eq!(parse_status_line("22x ready"), None);
        assert_eq!(parse_status_line("220_ready"), None);
    }

    #[test]
    fn test_pasv_with_parentheses() {
        assert_eq!(
            parse_pasv("Entering Passive Mode (127,0,0,1,117,49)."),
            Some(117 * 256 + 49)
        );
    }

    #[test]
    fn test_pasv_without_parentheses() {
        assert_eq!(parse_pasv("Entering Passive Mode 10,0,0,2,82,8"), Some(21000));
    }

    #[test]
    fn test_pasv_rejects_garbage() {
        assert_eq!(parse_pasv("Entering Passive Mode (127,0,0,1,300,1)"), None);
        assert_eq!(parse_pasv("Entering Passive Mode (127,0,0,1)"), None);
        assert_eq!(parse_pasv("nothing here"), None);
    }

    #[test]
    fn test_quoted_path() {
        assert_eq!(
            parse_quoted_path("\"/GetListing\" is your current location"),
            Some("/GetListing".to_string())
        );
        assert_eq!(
            parse_quoted_path("\"/odd\"\"name\" created"),
            Some("/odd\"name".to_string())
        );
        assert_eq!(parse_quoted_path("no quotes"), None);
        assert_eq!(parse_quoted_path("\"unterminated"), None);
    }

    #[test]
    fn test_reply_classes() {
        let reply = Reply {
            code: 150,
            lines: vec!["Opening data connection".into()],
        };
        assert!(reply.is_preliminary());
        assert!(!reply.is_completion());
        assert_eq!(reply.message(), "Opening data connection");
    }
}
