// src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{AttributeMap, AttributeValue};
use crate::models::{DirectoryObject, Group, OrgUnit};

/// Желаемое состояние пользователя Active Directory.
///
/// Пустая строка или `None` в текстовом атрибуте при Push означает очистку
/// атрибута в каталоге.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct User {
    pub base: DirectoryObject,

    /// Альтернативный ключ (sAMAccountName)
    pub sam_account_name: String,

    // Идентификаторы без ограничения уникальности
    pub employee_id: Option<String>,
    pub employee_number: Option<String>,
    pub email_address: Option<String>,
    pub user_principal_name: Option<String>,

    // Безопасность
    pub account_expiration_date: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub change_password_at_logon: bool,
    pub cannot_change_password: bool,
    pub password_never_expires: bool,
    pub password_not_required: bool,

    /// Новый пароль. Только на запись, наружу не сериализуется.
    #[serde(skip_serializing)]
    pub account_password: String,

    /// OU (или контейнер), в котором находится пользователь; заполняется при Pull
    pub org_unit: OrgUnit,

    /// Желаемое членство в группах
    pub groups: Vec<Group>,

    // Имя
    pub display_name: Option<String>,
    pub given_name: Option<String>,
    pub surname: Option<String>,
    pub other_name: Option<String>,
    pub initials: Option<String>,

    // Должность
    pub title: Option<String>,
    pub division: Option<String>,
    pub department: Option<String>,
    pub office: Option<String>,
    pub company: Option<String>,
    pub organization: Option<String>,
    pub home_page: Option<String>,
    pub description: Option<String>,

    // Телефоны
    pub office_phone: Option<String>,
    pub mobile_phone: Option<String>,
    pub home_phone: Option<String>,
    pub fax: Option<String>,

    // Почтовый адрес
    pub po_box: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl User {
    pub const OBJECT_CLASS: &'static str = "user";

    /// Новый пользователь, которого ещё нет в каталоге
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: DirectoryObject::named(name),
            ..Self::default()
        }
    }

    /// Все скалярные атрибуты для массового обновления (Set-ADUser).
    ///
    /// Пустые строки передаются как `Clear`, а не пропускаются.
    pub fn scalar_attributes(&self) -> AttributeMap {
        let mut attributes = AttributeMap::new();

        attributes.insert(
            "SamAccountName".to_string(),
            AttributeValue::text(&self.sam_account_name),
        );
        for (key, value) in self.text_attributes() {
            attributes.insert(key.to_string(), AttributeValue::optional_text(value));
        }
        for (key, value) in self.flag_attributes() {
            attributes.insert(key.to_string(), AttributeValue::Flag(value));
        }

        attributes
    }

    /// Применить набор атрибутов (обратная операция к `scalar_attributes`).
    ///
    /// Неизвестные ключи игнорируются.
    pub fn apply_attributes(&mut self, attributes: &AttributeMap) {
        for (key, value) in attributes {
            if key == "SamAccountName" {
                self.sam_account_name = value.as_text().unwrap_or_default().to_string();
                continue;
            }
            if let Some(slot) = self.text_attribute_mut(key) {
                *slot = value.as_text().map(str::to_string);
                continue;
            }
            if let Some(slot) = self.flag_attribute_mut(key) {
                *slot = value.as_flag().unwrap_or(false);
            }
        }
    }

    fn text_attributes(&self) -> [(&'static str, &Option<String>); 27] {
        [
            ("EmployeeID", &self.employee_id),
            ("EmployeeNumber", &self.employee_number),
            ("EmailAddress", &self.email_address),
            ("UserPrincipalName", &self.user_principal_name),
            ("DisplayName", &self.display_name),
            ("GivenName", &self.given_name),
            ("Surname", &self.surname),
            ("OtherName", &self.other_name),
            ("Initials", &self.initials),
            ("Title", &self.title),
            ("Division", &self.division),
            ("Department", &self.department),
            ("Office", &self.office),
            ("Company", &self.company),
            ("Organization", &self.organization),
            ("HomePage", &self.home_page),
            ("Description", &self.description),
            ("OfficePhone", &self.office_phone),
            ("MobilePhone", &self.mobile_phone),
            ("HomePhone", &self.home_phone),
            ("Fax", &self.fax),
            ("POBox", &self.po_box),
            ("StreetAddress", &self.street_address),
            ("City", &self.city),
            ("State", &self.state),
            ("PostalCode", &self.postal_code),
            ("Country", &self.country),
        ]
    }

    fn text_attribute_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
        let slot = match key {
            "EmployeeID" => &mut self.employee_id,
            "EmployeeNumber" => &mut self.employee_number,
            "EmailAddress" => &mut self.email_address,
            "UserPrincipalName" => &mut self.user_principal_name,
            "DisplayName" => &mut self.display_name,
            "GivenName" => &mut self.given_name,
            "Surname" => &mut self.surname,
            "OtherName" => &mut self.other_name,
            "Initials" => &mut self.initials,
            "Title" => &mut self.title,
            "Division" => &mut self.division,
            "Department" => &mut self.department,
            "Office" => &mut self.office,
            "Company" => &mut self.company,
            "Organization" => &mut self.organization,
            "HomePage" => &mut self.home_page,
            "Description" => &mut self.description,
            "OfficePhone" => &mut self.office_phone,
            "MobilePhone" => &mut self.mobile_phone,
            "HomePhone" => &mut self.home_phone,
            "Fax" => &mut self.fax,
            "POBox" => &mut self.po_box,
            "StreetAddress" => &mut self.street_address,
            "City" => &mut self.city,
            "State" => &mut self.state,
            "PostalCode" => &mut self.postal_code,
            "Country" => &mut self.country,
            _ => return None,
        };
        Some(slot)
    }

    fn flag_attributes(&self) -> [(&'static str, bool); 5] {
        [
            ("Enabled", self.enabled),
            ("ChangePasswordAtLogon", self.change_password_at_logon),
            ("CannotChangePassword", self.cannot_change_password),
            ("PasswordNeverExpires", self.password_never_expires),
            ("PasswordNotRequired", self.password_not_required),
        ]
    }

    fn flag_attribute_mut(&mut self, key: &str) -> Option<&mut bool> {
        let slot = match key {
            "Enabled" => &mut self.enabled,
            "ChangePasswordAtLogon" => &mut self.change_password_at_logon,
            "CannotChangePassword" => &mut self.cannot_change_password,
            "PasswordNeverExpires" => &mut self.password_never_expires,
            "PasswordNotRequired" => &mut self.password_not_required,
            _ => return None,
        };
        Some(slot)
    }
}
