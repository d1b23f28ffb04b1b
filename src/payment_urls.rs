//! Payment deep links
//!
//! Builds links that open a payee's Venmo, PayPal, Cash App or Zelle with the
//! amount (and where supported, a note) filled in.

use crate::model::Profile;
use std::fmt;
use std::str::FromStr;
use url::form_urlencoded;

/// Supported payment platforms, in discovery order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentMethod {
    Venmo,
    Paypal,
    Cashapp,
    Zelle,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Venmo,
        PaymentMethod::Paypal,
        PaymentMethod::Cashapp,
        PaymentMethod::Zelle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Venmo => "venmo",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::Cashapp => "cashapp",
            PaymentMethod::Zelle => "zelle",
        }
    }

    pub fn fee_info(&self) -> &'static str {
        match self {
            PaymentMethod::Venmo => "Free for friends/family",
            PaymentMethod::Paypal => "Free for friends/family",
            PaymentMethod::Cashapp => "Free for standard transfers",
            PaymentMethod::Zelle => "Always free (bank-to-bank)",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "venmo" => Ok(PaymentMethod::Venmo),
            "paypal" => Ok(PaymentMethod::Paypal),
            "cashapp" => Ok(PaymentMethod::Cashapp),
            "zelle" => Ok(PaymentMethod::Zelle),
            _ => Err(format!("Unknown payment method '{}'", s)),
        }
    }
}

/// A payee's payment handles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentInfo {
    pub venmo_handle: Option<String>,
    pub paypal_email: Option<String>,
    pub cashapp_handle: Option<String>,
    pub zelle_email: Option<String>,
    pub preferred_payment_method: Option<String>,
}

impl From<&Profile> for PaymentInfo {
    fn from(profile: &Profile) -> Self {
        Self {
            venmo_handle: profile.venmo_handle.clone(),
            paypal_email: profile.paypal_email.clone(),
            cashapp_handle: profile.cashapp_handle.clone(),
            zelle_email: profile.zelle_email.clone(),
            preferred_payment_method: profile.preferred_payment_method.clone(),
        }
    }
}

impl PaymentInfo {
    /// Non-empty handle for `method`.
    pub fn handle(&self, method: PaymentMethod) -> Option<&str> {
        let handle = match method {
            PaymentMethod::Venmo => &self.venmo_handle,
            PaymentMethod::Paypal => &self.paypal_email,
            PaymentMethod::Cashapp => &self.cashapp_handle,
            PaymentMethod::Zelle => &self.zelle_email,
        };
        handle.as_deref().filter(|h| !h.is_empty())
    }

    /// Methods the payee can receive with.
    pub fn available_methods(&self) -> Vec<PaymentMethod> {
        PaymentMethod::ALL
            .into_iter()
            .filter(|method| self.handle(*method).is_some())
            .collect()
    }
}

fn money(amount: f64) -> String {
    format!("{:.2}", amount)
}

/// `venmo://paycharge?recipients=..&txn=pay&amount=..&note=..`
pub fn venmo_url(username: &str, amount: f64, note: Option<&str>) -> String {
    let mut params = form_urlencoded::Serializer::new(String::new());
    params.append_pair("txn", "pay").append_pair("amount", &money(amount));
    if let Some(note) = note.filter(|n| !n.is_empty()) {
        params.append_pair("note", note);
    }
    format!(
        "venmo://paycharge?recipients={}&{}",
        username.trim_start_matches('@'),
        params.finish()
    )
}

/// Classic checkout link for an email, PayPal.me link for a username.
pub fn paypal_url(email: &str, amount: f64, note: Option<&str>, currency: &str) -> String {
    if email.contains('@') {
        let mut params = form_urlencoded::Serializer::new(String::new());
        params
            .append_pair("cmd", "_xclick")
            .append_pair("business", email)
            .append_pair("amount", &money(amount))
            .append_pair("currency_code", currency)
            .append_pair("no_shipping", "1");
        if let Some(note) = note.filter(|n| !n.is_empty()) {
            params.append_pair("item_name", note);
        }
        format!("https://www.paypal.com/cgi-bin/webscr?{}", params.finish())
    } else {
        format!("https://www.paypal.me/{}/{}{}", email, money(amount), currency)
    }
}

/// Cash App takes no note.
pub fn cashapp_url(cashtag: &str, amount: f64) -> String {
    format!(
        "https://cash.app/${}/{}",
        cashtag.trim_start_matches('$'),
        money(amount)
    )
}

pub fn zelle_url(email_or_phone: &str, amount: f64) -> String {
    let to: String = form_urlencoded::byte_serialize(email_or_phone.as_bytes()).collect();
    format!("https://www.zellepay.com/send?to={}&amount={}", to, money(amount))
}

/// Link for paying `amount` to the payee through `method`, if they accept it.
pub fn payment_url(
    method: PaymentMethod,
    info: &PaymentInfo,
    amount: f64,
    note: Option<&str>,
    currency: &str,
) -> Option<String> {
    let handle = info.handle(method)?;
    Some(match method {
        PaymentMethod::Venmo => venmo_url(handle, amount, note),
        PaymentMethod::Paypal => paypal_url(handle, amount, note, currency),
        PaymentMethod::Cashapp => cashapp_url(handle, amount),
        PaymentMethod::Zelle => zelle_url(handle, amount),
    })
}
