//! Shared constants for driving the CourtReserve front end
//!
//! Selectors live here so that a markup change on the site is a one-line fix.

/// Chrome user agent string for stealth mode
///
/// Chrome releases new stable versions ~every 4 weeks.
/// Update quarterly to stay within reasonable version window.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Injected before any page script runs
pub const HIDE_WEBDRIVER_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

// Login form
pub const USERNAME_INPUT: &str = "input[type='text']";
pub const PASSWORD_INPUT: &str = "input[type='password']";
pub const LOGIN_SUBMIT: &str = "button[type='submit']";

// Schedule grid
pub const NEXT_DAY_BUTTON: &str = "button[title='Next']";
pub const RESERVE_BUTTON_TEXT: &str = "Reserve";
pub const COURT_HEADER_KEYWORD: &str = "Court";
pub const SLOT_ATTRIBUTE: &str = "data-courtbook-slot";

// Kendo calendar picker
pub const CALENDAR_TRIGGERS: &str =
    ".k-datepicker, .k-nav-current, [title='Select date'], .k-scheduler-navigation .k-nav-current";
pub const CALENDAR_POPUP: &str = ".k-calendar, .k-datepicker-calendar";
pub const CALENDAR_NEXT_MONTH: &str = ".k-calendar .k-nav-next, .k-calendar .k-calendar-nav-next";

// Kendo widgets
pub const KENDO_DROPDOWN: &str = ".k-dropdown, .k-dropdownlist, span[role='listbox'], span[role='combobox']";
pub const KENDO_DROPDOWN_TEXT: &str = ".k-input-inner, .k-input-value-text, .k-input";
pub const KENDO_OPTIONS: &str = ".k-animation-container .k-list li, .k-popup .k-list-item";

// Booking modal
pub const MODAL: &str = ".modal, [role='dialog']";
pub const DURATION_LABEL_TEXT: &str = "Duration";
pub const GUEST_PLAYER_INPUT: &str = "input[name='OwnersDropdown_input']";
pub const AUTOCOMPLETE_ITEMS: &str = ".k-list-item, [role='option']";
pub const SAVE_BUTTON: &str = "button.btn.btn-primary.btn-submit";

/// Placeholder text shown by the reservation type dropdown before a choice is made
pub const RESERVATION_TYPE_PLACEHOLDER: &str = "reservation type";

/// Lower-case fragments that mark a duration dropdown
pub const DURATION_DROPDOWN_NEEDLES: &[&str] = &["minute", "hour"];

/// Lower-case page text fragments that indicate an accepted reservation
pub const SUCCESS_INDICATORS: &[&str] = &[
    "reservation created",
    "booking confirmed",
    "successfully",
    "confirmed",
    "thank you",
];

/// Lower-case page text fragments that indicate a rejected reservation
pub const ERROR_INDICATORS: &[&str] = &[
    "already booked",
    "not available",
    "unavailable",
    "conflict",
    "is required",
    "invalid",
    "failed",
    "error",
];
