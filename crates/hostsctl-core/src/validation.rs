//! Field validators for hosts file entries
//!
//! Pure functions with no side effects. Each `validate_*` function returns a
//! [`ValidationError`] naming the field, the rejected value and the reason;
//! the `is_valid_*` helpers collapse that to a boolean.
//!
//! IP validation is purely syntactic and deliberately narrower than
//! [`std::net::IpAddr`] parsing: IPv4 groups may not carry leading zeros and
//! IPv6 addresses may not embed a dotted IPv4 tail or a zone suffix.

use crate::error::ValidationError;

/// Maximum length of a full hostname
pub const MAX_HOSTNAME_LEN: usize = 253;

/// Maximum length of a single hostname label
pub const MAX_LABEL_LEN: usize = 63;

/// Maximum length of an entry comment
pub const MAX_COMMENT_LEN: usize = 255;

/// Validate a dotted-quad IPv4 address
pub fn validate_ipv4(ip: &str) -> Result<(), ValidationError> {
    if ip.is_empty() {
        return Err(ValidationError::new("ip", ip, "IPv4 address cannot be empty"));
    }

    let groups: Vec<&str> = ip.split('.').collect();
    if groups.len() != 4 || !groups.iter().all(|g| is_ipv4_group(g)) {
        return Err(ValidationError::new("ip", ip, "invalid IPv4 address format"));
    }

    Ok(())
}

fn is_ipv4_group(group: &str) -> bool {
    if group.is_empty() || group.len() > 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if group.len() > 1 && group.starts_with('0') {
        return false;
    }
    group.parse::<u16>().is_ok_and(|n| n <= 255)
}

/// Validate an IPv6 address in full or `::`-compressed notation
pub fn validate_ipv6(ip: &str) -> Result<(), ValidationError> {
    if ip.is_empty() {
        return Err(ValidationError::new("ip", ip, "IPv6 address cannot be empty"));
    }

    let valid = if ip.contains("::") {
        let halves: Vec<&str> = ip.split("::").collect();
        match halves.as_slice() {
            [left, right] => {
                let left = ipv6_groups(left);
                let right = ipv6_groups(right);
                // The compressed run must stand for at least one group.
                left.len() + right.len() < 8
                    && left.iter().chain(right.iter()).all(|g| is_ipv6_group(g))
            }
            _ => false,
        }
    } else {
        let groups: Vec<&str> = ip.split(':').collect();
        groups.len() == 8 && groups.iter().all(|g| is_ipv6_group(g))
    };

    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("ip", ip, "invalid IPv6 address format"))
    }
}

fn ipv6_groups(half: &str) -> Vec<&str> {
    if half.is_empty() {
        Vec::new()
    } else {
        half.split(':').collect()
    }
}

fn is_ipv6_group(group: &str) -> bool {
    (1..=4).contains(&group.len()) && group.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Validate an IP address of either family
pub fn validate_ip(ip: &str) -> Result<(), ValidationError> {
    if ip.is_empty() {
        return Err(ValidationError::new("ip", ip, "IP address cannot be empty"));
    }
    if validate_ipv4(ip).is_ok() || validate_ipv6(ip).is_ok() {
        Ok(())
    } else {
        Err(ValidationError::new("ip", ip, "invalid IP address format"))
    }
}

/// Validate a hostname
///
/// Labels are separated by single dots, 1-63 ASCII alphanumerics or hyphens
/// each, and may not start or end with a hyphen. `localhost` is always
/// accepted.
pub fn validate_hostname(hostname: &str) -> Result<(), ValidationError> {
    let fail = |message: &str| Err(ValidationError::new("hostname", hostname, message));

    if hostname.is_empty() {
        return fail("hostname cannot be empty");
    }
    if hostname.len() > MAX_HOSTNAME_LEN {
        return fail("hostname too long (max 253 characters)");
    }
    if hostname == "localhost" {
        return Ok(());
    }
    if hostname.starts_with('.') || hostname.ends_with('.') {
        return fail("hostname cannot start or end with a dot");
    }
    if hostname.contains("..") {
        return fail("hostname cannot contain consecutive dots");
    }

    for label in hostname.split('.') {
        if label.len() > MAX_LABEL_LEN {
            return fail("hostname label too long (max 63 characters per label)");
        }
        if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return fail("invalid hostname format");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return fail("hostname label cannot start or end with hyphen");
        }
    }

    Ok(())
}

/// Validate a list of hostnames for a single entry
///
/// Returns every problem found; an empty list means the names are usable.
/// A name repeated within the same list is reported once per repetition.
pub fn validate_hostnames<S: AsRef<str>>(hostnames: &[S]) -> Vec<ValidationError> {
    if hostnames.is_empty() {
        return vec![ValidationError::new(
            "hostnames",
            "",
            "at least one hostname is required",
        )];
    }

    let mut errors = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for (index, hostname) in hostnames.iter().enumerate() {
        let hostname = hostname.as_ref();
        if !seen.insert(hostname) {
            errors.push(ValidationError::new(
                "hostnames",
                hostname,
                "duplicate hostname in list",
            ));
            continue;
        }
        if let Err(mut err) = validate_hostname(hostname) {
            err.field = format!("hostnames[{index}]");
            errors.push(err);
        }
    }
    errors
}

/// Validate an entry comment
pub fn validate_comment(comment: &str) -> Result<(), ValidationError> {
    if comment.len() > MAX_COMMENT_LEN {
        return Err(ValidationError::new(
            "comment",
            comment,
            "comment too long (max 255 characters)",
        ));
    }
    if comment.contains('\n') || comment.contains('\r') {
        return Err(ValidationError::new(
            "comment",
            comment,
            "comment cannot contain newlines",
        ));
    }
    Ok(())
}

/// Returns `true` if `ip` is a valid IPv4 or IPv6 address
pub fn is_valid_ip(ip: &str) -> bool {
    validate_ip(ip).is_ok()
}

/// Returns `true` if `ip` is a valid IPv4 address
pub fn is_valid_ipv4(ip: &str) -> bool {
    validate_ipv4(ip).is_ok()
}

/// Returns `true` if `ip` is a valid IPv6 address
pub fn is_valid_ipv6(ip: &str) -> bool {
    validate_ipv6(ip).is_ok()
}

/// Returns `true` if `hostname` is a valid hostname
pub fn is_valid_hostname(hostname: &str) -> bool {
    validate_hostname(hostname).is_ok()
}

/// Returns `true` if `comment` is a valid comment
pub fn is_valid_comment(comment: &str) -> bool {
    validate_comment(comment).is_ok()
}
