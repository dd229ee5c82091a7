// src/backend/powershell/json.rs

//! Разбор вывода `ConvertTo-Json` для объектов AD.
//!
//! Коллекция из одного элемента может прийти скаляром, а даты — как в Windows
//! PowerShell (`/Date(ms)/`), так и в ISO 8601.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use crate::backend::{BackendError, GroupEntry, UserEntry};
use crate::models::{DirectoryObject, Group, OrgUnit, User};

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct ObjectDto {
    #[serde(rename = "ObjectGUID", alias = "ObjectGuid")]
    object_guid: Option<Uuid>,
    object_class: Option<String>,
    distinguished_name: Option<String>,
    name: Option<String>,
}

impl ObjectDto {
    fn into_object(self) -> DirectoryObject {
        DirectoryObject {
            name: self.name.unwrap_or_default(),
            object_class: self.object_class.unwrap_or_default(),
            object_guid: self.object_guid.unwrap_or_default(),
            distinguished_name: self.distinguished_name.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct UserDto {
    #[serde(flatten)]
    object: ObjectDto,

    sam_account_name: Option<String>,
    #[serde(rename = "EmployeeID")]
    employee_id: Option<String>,
    employee_number: Option<String>,
    email_address: Option<String>,
    user_principal_name: Option<String>,

    #[serde(deserialize_with = "directory_date")]
    account_expiration_date: Option<DateTime<Utc>>,
    enabled: Option<bool>,
    #[serde(rename = "pwdLastSet", alias = "PwdLastSet")]
    pwd_last_set: Option<i64>,
    cannot_change_password: Option<bool>,
    password_never_expires: Option<bool>,
    password_not_required: Option<bool>,

    #[serde(alias = "memberOf", deserialize_with = "one_or_many")]
    member_of: Vec<String>,

    display_name: Option<String>,
    given_name: Option<String>,
    surname: Option<String>,
    other_name: Option<String>,
    initials: Option<String>,
    title: Option<String>,
    division: Option<String>,
    department: Option<String>,
    office: Option<String>,
    company: Option<String>,
    organization: Option<String>,
    home_page: Option<String>,
    description: Option<String>,
    office_phone: Option<String>,
    mobile_phone: Option<String>,
    home_phone: Option<String>,
    fax: Option<String>,
    #[serde(rename = "POBox")]
    po_box: Option<String>,
    street_address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    postal_code: Option<String>,
    country: Option<String>,
}

impl UserDto {
    fn into_entry(self) -> UserEntry {
        let user = User {
            base: self.object.into_object(),
            sam_account_name: self.sam_account_name.unwrap_or_default(),
            employee_id: self.employee_id,
            employee_number: self.employee_number,
            email_address: self.email_address,
            user_principal_name: self.user_principal_name,
            account_expiration_date: self.account_expiration_date,
            enabled: self.enabled.unwrap_or(false),
            // pwdLastSet = 0 означает «сменить пароль при следующем входе»
            change_password_at_logon: self.pwd_last_set == Some(0),
            cannot_change_password: self.cannot_change_password.unwrap_or(false),
            password_never_expires: self.password_never_expires.unwrap_or(false),
            password_not_required: self.password_not_required.unwrap_or(false),
            display_name: self.display_name,
            given_name: self.given_name,
            surname: self.surname,
            other_name: self.other_name,
            initials: self.initials,
            title: self.title,
            division: self.division,
            department: self.department,
            office: self.office,
            company: self.company,
            organization: self.organization,
            home_page: self.home_page,
            description: self.description,
            office_phone: self.office_phone,
            mobile_phone: self.mobile_phone,
            home_phone: self.home_phone,
            fax: self.fax,
            po_box: self.po_box,
            street_address: self.street_address,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            country: self.country,
            ..User::default()
        };

        UserEntry {
            user,
            member_of: self.member_of,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct GroupDto {
    #[serde(flatten)]
    object: ObjectDto,
    sam_account_name: Option<String>,
    display_name: Option<String>,
    description: Option<String>,
    #[serde(alias = "memberOf", deserialize_with = "one_or_many")]
    member_of: Vec<String>,
    #[serde(alias = "members", deserialize_with = "one_or_many")]
    members: Vec<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct OrgUnitDto {
    #[serde(flatten)]
    object: ObjectDto,
    city: Option<String>,
    country: Option<String>,
    description: Option<String>,
    display_name: Option<String>,
    postal_code: Option<String>,
    state: Option<String>,
    street_address: Option<String>,
    protected_from_accidental_deletion: Option<bool>,
}

pub(crate) fn parse_object(json: &str) -> Result<DirectoryObject, BackendError> {
    let dto: ObjectDto = parse(json)?;
    Ok(dto.into_object())
}

pub(crate) fn parse_user(json: &str) -> Result<UserEntry, BackendError> {
    let dto: UserDto = parse(json)?;
    Ok(dto.into_entry())
}

pub(crate) fn parse_group(json: &str) -> Result<GroupEntry, BackendError> {
    let dto: GroupDto = parse(json)?;
    Ok(GroupEntry {
        group: Group {
            base: dto.object.into_object(),
            sam_account_name: dto.sam_account_name.unwrap_or_default(),
            display_name: dto.display_name,
            description: dto.description,
            groups: Vec::new(),
            members: dto.members,
        },
        member_of: dto.member_of,
    })
}

pub(crate) fn parse_org_unit(json: &str) -> Result<OrgUnit, BackendError> {
    let dto: OrgUnitDto = parse(json)?;
    Ok(OrgUnit {
        base: dto.object.into_object(),
        city: dto.city,
        country: dto.country,
        description: dto.description,
        display_name: dto.display_name,
        postal_code: dto.postal_code,
        state: dto.state,
        street_address: dto.street_address,
        protected_from_accidental_deletion: dto.protected_from_accidental_deletion.unwrap_or(false),
    })
}

fn parse<T: for<'de> Deserialize<'de>>(json: &str) -> Result<T, BackendError> {
    let json = json.trim();
    if json.is_empty() {
        return Err(BackendError::Parse("Command returned no output".to_string()));
    }
    Ok(serde_json::from_str(json)?)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<OneOrMany> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(OneOrMany::One(item)) => vec![item],
        Some(OneOrMany::Many(items)) => items,
        None => Vec::new(),
    })
}

fn directory_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value {
        Some(text) => parse_date(&text)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", text))),
        None => Ok(None),
    }
}

/// `/Date(1700000000000)/` или ISO 8601 (без зоны считается UTC)
fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Some(inner) = text.strip_prefix("/Date(").and_then(|rest| rest.strip_suffix(")/")) {
        // Смещение вида +0300 не меняет момент времени
        let millis = inner
            .split(|ch| ch == '+' || (ch == '-' && !inner.starts_with(ch)))
            .next()?;
        return Utc.timestamp_millis_opt(millis.parse().ok()?).single();
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
