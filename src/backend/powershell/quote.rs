// src/backend/powershell/quote.rs

//! Подстановка значений в текст команды PowerShell.
//!
//! Любое пользовательское значение попадает в скрипт только как строка в
//! одинарных кавычках; интерполяция внутри них не выполняется.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::backend::AttributeValue;

/// Строка в одинарных кавычках.
///
/// PowerShell считает одинарной кавычкой и типографские ‘ ’ ‚ ‛, поэтому они
/// удваиваются так же, как `'`.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if matches!(ch, '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}') {
            out.push(ch);
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

pub fn boolean(value: bool) -> &'static str {
    if value { "$true" } else { "$false" }
}

/// SecureString из открытого текста
pub fn secure_string(value: &str) -> String {
    format!("(ConvertTo-SecureString {} -AsPlainText -Force)", quote(value))
}

/// Объект PSCredential
pub fn credential(username: &str, password: &str) -> String {
    format!(
        "(New-Object System.Management.Automation.PSCredential ({}, {}))",
        quote(username),
        secure_string(password)
    )
}

/// Дата в UTC, разобранная независимо от региональных настроек
pub fn datetime(at: &DateTime<Utc>) -> String {
    format!(
        "([datetime]::Parse({}, [System.Globalization.CultureInfo]::InvariantCulture, [System.Globalization.DateTimeStyles]::RoundtripKind))",
        quote(&at.to_rfc3339_opts(SecondsFormat::Secs, true))
    )
}

/// Массив строк: @('a', 'b')
pub fn array(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|value| quote(value)).collect();
    format!("@({})", items.join(", "))
}

/// Значение атрибута для Set-ADUser; очистка через `$null`
pub fn attribute(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Text(text) => quote(text),
        AttributeValue::Flag(flag) => boolean(*flag).to_string(),
        AttributeValue::Clear => "$null".to_string(),
    }
}

/// Именованный параметр: ` -Name value`
pub fn param(name: &str, value: &str) -> String {
    format!(" -{} {}", name, value)
}

/// Имя параметра или свойства: только буквы и цифры
pub fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|ch| ch.is_ascii_alphanumeric())
}
