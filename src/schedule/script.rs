//! In-page JavaScript used to read the schedule grid
//!
//! Scripts always return an object (never `null`/`undefined`) so that
//! `EvaluationResult::into_value` has something to deserialize.

/// Collects header cells, booked reservation containers and visible Reserve buttons
/// with their page-space horizontal position.
///
/// Every visible Reserve button is tagged with `data-courtbook-slot="<n>"`, which is
/// how the Rust side clicks the chosen slot later without holding a node handle.
pub const COLLECT_GRID: &str = r#"
(() => {
  const pos = (el) => {
    const r = el.getBoundingClientRect();
    return { left: r.left + window.scrollX, width: r.width };
  };
  const visible = (el) => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);

  let headers = [];
  for (const row of document.querySelectorAll('tr')) {
    const ths = row.querySelectorAll('th');
    if (ths.length > 1) {
      headers = Array.from(ths).map((th, index) => Object.assign(
        { index, text: (th.innerText || '').trim() }, pos(th)));
      break;
    }
  }

  const booked = Array.from(document.querySelectorAll('.fn-portal-reservation-container'))
    .filter(visible)
    .map((el) => Object.assign({ text: (el.innerText || '').trim() }, pos(el)));

  document.querySelectorAll('[data-courtbook-slot]')
    .forEach((el) => el.removeAttribute('data-courtbook-slot'));

  const available = [];
  for (const button of document.querySelectorAll('button')) {
    if (!(button.textContent || '').includes('Reserve') || !visible(button)) continue;
    const slot_id = available.length;
    button.setAttribute('data-courtbook-slot', String(slot_id));
    available.push(Object.assign({ slot_id, text: (button.innerText || '').trim() }, pos(button)));
  }

  return { headers, booked, available };
})()
"#;

/// Text of the date label above the grid, used to sanity-check day navigation
pub const CURRENT_DATE_LABEL: &str = r#"
(() => {
  const candidates = document.querySelectorAll(
    '.k-nav-current, .k-datepicker input, .k-scheduler-navigation, [title="Select date"]');
  const texts = Array.from(candidates)
    .map((el) => (el.value || el.innerText || '').trim())
    .filter((t) => t.length > 0);
  return { texts };
})()
"#;
