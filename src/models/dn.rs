// src/models/dn.rs

//! Разбор Distinguished Name (DN).
//!
//! Компоненты разделяются запятыми; экранированная запятая (`\,`) частью
//! разделителя не считается.

/// Разбить DN на компоненты (RDN), сохраняя экранирование
pub fn components(dn: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (i, ch) in dn.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ',' => {
                parts.push(dn[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }

    let tail = dn[start..].trim();
    if !tail.is_empty() || !parts.is_empty() {
        parts.push(tail);
    }
    parts
}

/// DN указывает на корень домена (DC=...)
pub fn is_domain_root(dn: &str) -> bool {
    dn.trim()
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("DC="))
}

/// Разобрать DN на имя листа (без `CN=`/`OU=`) и DN родителя.
///
/// Корень домена не имеет листа и считается собственным родителем.
pub fn parse(dn: &str) -> (String, String) {
    if is_domain_root(dn) {
        return (String::new(), dn.trim().to_string());
    }

    let parts = components(dn);
    match parts.split_first() {
        Some((leaf, rest)) => (leaf_value(leaf).to_string(), rest.join(",")),
        None => (String::new(), String::new()),
    }
}

/// DN родительского контейнера
pub fn parent(dn: &str) -> String {
    parse(dn).1
}

/// Значение RDN без префикса `CN=` или `OU=`
pub fn leaf_value(rdn: &str) -> &str {
    match rdn.get(..3) {
        Some(prefix)
            if prefix.eq_ignore_ascii_case("CN=") || prefix.eq_ignore_ascii_case("OU=") =>
        {
            &rdn[3..]
        }
        _ => rdn,
    }
}

/// Экранировать значение для подстановки в RDN (RFC 4514)
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, ch) in value.chars().enumerate() {
        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                out.push('\\');
                out.push(ch);
            }
            '#' | ' ' if i == 0 => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    if out.ends_with(' ') && !out.ends_with("\\ ") {
        out.pop();
        out.push_str("\\ ");
    }
    out
}
