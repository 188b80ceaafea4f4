//! Masking of identifiers and personal data before they reach the logs.

/// Keep only the last four characters: `TRV-1700000000-42` -> `***0-42`
pub fn mask_order_id(order_id: &str) -> String {
    let chars: Vec<char> = order_id.chars().collect();
    if chars.is_empty() {
        return "N/A".to_string();
    }
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("***{}", tail)
}

/// `john.doe@example.com` -> `j***e@e***.com`
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return email.to_string();
    };
    if local.is_empty() || domain.is_empty() {
        return email.to_string();
    }

    let local_chars: Vec<char> = local.chars().collect();
    let masked_local = if local_chars.len() > 2 {
        format!(
            "{}{}{}",
            local_chars[0],
            "*".repeat((local_chars.len() - 2).min(3)),
            local_chars[local_chars.len() - 1]
        )
    } else {
        "*".repeat(local_chars.len())
    };

    let mut domain_parts = domain.split('.');
    let name: Vec<char> = domain_parts.next().unwrap_or_default().chars().collect();
    let masked_name = if name.len() > 1 {
        format!("{}{}", name[0], "*".repeat((name.len() - 1).min(3)))
    } else {
        name.iter().collect()
    };
    let rest: Vec<&str> = domain_parts.collect();

    if rest.is_empty() {
        format!("{}@{}", masked_local, masked_name)
    } else {
        format!("{}@{}.{}", masked_local, masked_name, rest.join("."))
    }
}

/// `+6281234567890` -> `+628123***7890`, `081234567890` -> `0812****7890`
pub fn mask_phone(phone: &str) -> String {
    let cleaned: String = phone
        .chars()
        .enumerate()
        .filter(|(i, c)| c.is_ascii_digit() || (*i == 0 && *c == '+'))
        .map(|(_, c)| c)
        .collect();

    if cleaned.len() < 8 {
        return phone.to_string();
    }

    let keep_start = if cleaned.starts_with('+') { 7 } else { 4 };
    let keep_end = 4;

    if cleaned.len() <= keep_start + keep_end {
        let middle = (cleaned.len() - 2) / 2;
        let tail = 4.min(cleaned.len() - middle);
        return format!(
            "{}****{}",
            &cleaned[..middle],
            &cleaned[cleaned.len() - tail..]
        );
    }

    let mask_len = (cleaned.len() - keep_start - keep_end).min(4);
    format!(
        "{}{}{}",
        &cleaned[..keep_start],
        "*".repeat(mask_len),
        &cleaned[cleaned.len() - keep_end..]
    )
}
