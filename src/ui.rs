use crate::models::{Banner, Location, MenuItem, Order};
use crate::status::PICKUP_STEPS;
use std::collections::BTreeMap;
use std::fmt::Write;

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn money(cents: u64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

/// Storefront landing page: banners, then the menu grouped by category.
pub fn render_menu<'a>(
    banners: impl IntoIterator<Item = &'a Banner>,
    menu: impl IntoIterator<Item = &'a MenuItem>,
    locations: impl IntoIterator<Item = &'a Location>,
) -> String {
    let mut banner_html = String::new();
    for banner in banners {
        let _ = write!(
            banner_html,
            r#"<article class="banner"><h2>{}</h2><p>{}</p></article>"#,
            escape(&banner.title),
            escape(&banner.body)
        );
    }

    let mut categories: BTreeMap<&str, Vec<&MenuItem>> = BTreeMap::new();
    for item in menu {
        categories.entry(item.category.as_str()).or_default().push(item);
    }
    let mut menu_html = String::new();
    for (category, mut items) in categories {
        items.sort_by_key(|item| (item.sort_order, item.name.clone()));
        let _ = write!(menu_html, r#"<section class="category"><h2>{}</h2>"#, escape(category));
        for item in items {
            let price = item
                .variants
                .iter()
                .map(|variant| variant.price_cents)
                .min()
                .unwrap_or(item.price_cents);
            let _ = write!(
                menu_html,
                r#"<div class="item{}"><div><h3>{}</h3><p>{}</p></div><span class="price">{}{}</span></div>"#,
                if item.available { "" } else { " sold-out" },
                escape(&item.name),
                escape(&item.description),
                if item.variants.len() > 1 { "from " } else { "" },
                money(price)
            );
        }
        menu_html.push_str("</section>");
    }
    if menu_html.is_empty() {
        menu_html.push_str(r#"<p class="subtitle">The menu is being prepared. Check back soon.</p>"#);
    }

    let mut location_html = String::new();
    for location in locations {
        let _ = write!(
            location_html,
            r#"<li><strong>{}</strong> {}</li>"#,
            escape(&location.name),
            escape(&location.address)
        );
    }

    fill(
        MENU_HTML,
        &[
            ("BANNERS", banner_html.as_str()),
            ("MENU", menu_html.as_str()),
            ("LOCATIONS", location_html.as_str()),
        ],
    )
}

/// Order confirmation page; live updates come from the SSE stream with a
/// polling fallback.
pub fn render_order(order: &Order) -> String {
    let mut items_html = String::new();
    for item in &order.items {
        let mut label = escape(&item.name);
        if let Some(variant) = &item.variant {
            let _ = write!(label, " ({})", escape(variant));
        }
        let _ = write!(
            items_html,
            r#"<li><span>{} × {}</span><span>{}</span></li>"#,
            item.quantity,
            label,
            money(item.line_total_cents)
        );
    }
    let steps_html: String = PICKUP_STEPS
        .iter()
        .enumerate()
        .map(|(index, step)| format!(r#"<li data-step="{index}">{step}</li>"#))
        .collect();

    fill(
        ORDER_HTML,
        &[
            ("ORDER_ID", order.id.to_string().as_str()),
            ("NUMBER", order.number.to_string().as_str()),
            ("NAME", escape(&order.contact.name).as_str()),
            ("ITEMS", items_html.as_str()),
            ("STEPS", steps_html.as_str()),
            ("TOTAL", money(order.totals.total_cents).as_str()),
        ],
    )
}

/// Substitutes `{{KEY}}` placeholders in one pass; substituted text is never
/// scanned again.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let value = after.find("}}").and_then(|end| {
            values
                .iter()
                .find(|(key, _)| *key == &after[..end])
                .map(|(_, value)| (*value, end))
        });
        match value {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

const STYLE: &str = r#"
    @import url('https://fonts.googleapis.com/css2?family=Space+Grotesk:wght@400;500;600&family=Fraunces:wght@600&display=swap');
    :root {
      --bg-1: #f8f3e6;
      --bg-2: #f5d3a7;
      --ink: #2b2a28;
      --accent: #ff6b4a;
      --accent-2: #2f4858;
      --card: rgba(255, 255, 255, 0.86);
      --shadow: 0 24px 60px rgba(47, 72, 88, 0.18);
    }
    * { box-sizing: border-box; }
    body {
      margin: 0;
      min-height: 100vh;
      background: radial-gradient(circle at top, var(--bg-2), transparent 60%),
        linear-gradient(135deg, var(--bg-1), #ffe9d4 60%, #f9f2e9 100%);
      color: var(--ink);
      font-family: "Space Grotesk", "Trebuchet MS", sans-serif;
      display: grid;
      place-items: center;
      padding: 32px 18px 48px;
    }
    .app {
      width: min(860px, 100%);
      background: var(--card);
      border-radius: 28px;
      box-shadow: var(--shadow);
      padding: 36px;
      display: grid;
      gap: 24px;
    }
    h1, h2 { font-family: "Fraunces", "Georgia", serif; margin: 0; }
    .subtitle { margin: 0; color: #5f5c57; }
    .banner { background: var(--accent); color: white; border-radius: 18px; padding: 18px; }
    .banner p { margin: 6px 0 0; }
    .category { display: grid; gap: 10px; }
    .item {
      display: flex; justify-content: space-between; gap: 16px;
      background: white; border-radius: 18px; padding: 16px;
      border: 1px solid rgba(47, 72, 88, 0.08);
    }
    .item h3 { margin: 0 0 4px; }
    .item p { margin: 0; color: #8b857d; }
    .item.sold-out { opacity: 0.5; }
    .price { font-weight: 600; color: var(--accent-2); white-space: nowrap; }
    ul { list-style: none; padding: 0; margin: 0; display: grid; gap: 8px; }
    .lines li { display: flex; justify-content: space-between; }
    .steps { grid-auto-flow: column; }
    .steps li {
      text-align: center; padding: 12px; border-radius: 999px;
      background: white; text-transform: capitalize; color: #8b857d;
    }
    .steps li.done { background: var(--accent-2); color: white; }
    .status { min-height: 1.2em; font-weight: 600; color: var(--accent); }
"#;

const MENU_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>MESO</title>
  <link rel="stylesheet" href="/assets/style.css" />
</head>
<body>
  <main class="app">
    <header>
      <h1>MESO</h1>
      <p class="subtitle">Order ahead for pickup or delivery. Members earn MESO Club points on every order.</p>
    </header>
    {{BANNERS}}
    {{MENU}}
    <section>
      <h2>Locations</h2>
      <ul>{{LOCATIONS}}</ul>
    </section>
  </main>
</body>
</html>
"#;

const ORDER_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Order #{{NUMBER}} | MESO</title>
  <link rel="stylesheet" href="/assets/style.css" />
</head>
<body>
  <main class="app" data-order="{{ORDER_ID}}">
    <header>
      <h1>Order #{{NUMBER}}</h1>
      <p class="subtitle">Thanks, {{NAME}}. We'll keep this page up to date.</p>
    </header>
    <ul class="steps" id="steps">{{STEPS}}</ul>
    <div class="status" id="status"></div>
    <ul class="lines">{{ITEMS}}</ul>
    <p><strong>Total {{TOTAL}}</strong></p>
  </main>
  <script>
    const orderId = document.querySelector('.app').dataset.order;
    const statusEl = document.getElementById('status');
    const steps = Array.from(document.querySelectorAll('#steps li'));
    const terminalText = {
      payment_failed: 'Payment failed. Your card was not charged.',
      payment_cancelled: 'Payment was cancelled.',
      order_cancelled: 'This order was cancelled.',
      order_failed: 'This order could not be completed.'
    };
    let timer = null;

    const render = (progress, extra) => {
      if (progress.kind === 'terminal') {
        steps.forEach((step) => step.classList.remove('done'));
        statusEl.textContent = terminalText[progress.value] || 'Order closed.';
        if (timer) { clearInterval(timer); }
        return;
      }
      steps.forEach((step, index) => step.classList.toggle('done', index <= progress.value));
      statusEl.textContent = extra || '';
    };

    const poll = async () => {
      const response = await fetch(`/api/orders/${orderId}`);
      if (!response.ok) { return; }
      const view = await response.json();
      render(view.progress, view.payment_timed_out ? 'Payment timed out.' : '');
    };

    poll();
    if (window.EventSource) {
      const source = new EventSource(`/api/orders/${orderId}/events`);
      source.addEventListener('order_status', (event) => render(JSON.parse(event.data).progress));
      source.onerror = () => {
        source.close();
        if (!timer) { timer = setInterval(poll, 5000); }
      };
    } else {
      timer = setInterval(poll, 5000);
    }
  </script>
</body>
</html>
"#;

pub fn stylesheet() -> &'static str {
    STYLE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Contact, PaymentMethod, StatusTimestamps, Totals};
    use crate::status::{Fulfillment, OrderStatus, PaymentStatus};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<b>"Tom & Jerry's"</b>"#), "&lt;b&gt;&quot;Tom &amp; Jerry&#39;s&quot;&lt;/b&gt;");
    }

    #[test]
    fn money_formats_cents() {
        assert_eq!(money(0), "$0.00");
        assert_eq!(money(1205), "$12.05");
    }

    #[test]
    fn empty_menu_renders_placeholder() {
        let html = render_menu(Vec::new(), Vec::new(), Vec::new());
        assert!(html.contains("being prepared"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn customer_text_is_not_treated_as_a_placeholder() {
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            number: 1042,
            location_id: Uuid::new_v4(),
            customer_id: None,
            fulfillment: Fulfillment::Pickup,
            contact: Contact {
                name: "{{ITEMS}} {{TOTAL}}".into(),
                phone: "555-0100".into(),
                email: None,
            },
            delivery_address: None,
            payment_method: PaymentMethod::Cash,
            payment_status: PaymentStatus::PayOnSite,
            payment_session_id: None,
            status: OrderStatus::Confirmed,
            items: Vec::new(),
            totals: Totals {
                total_cents: 1250,
                ..Totals::default()
            },
            promo_code: None,
            coupon_id: None,
            points_awarded: 0,
            timestamps: StatusTimestamps::default(),
            created_at: now,
            updated_at: now,
        };
        let html = render_order(&order);
        assert!(html.contains("Thanks, {{ITEMS}} {{TOTAL}}."));
        assert!(html.contains("Order #1042"));
        assert!(html.contains("Total $12.50"));
    }

    #[test]
    fn banner_text_is_not_treated_as_a_placeholder() {
        let banner = Banner {
            id: Uuid::new_v4(),
            title: "{{MENU}}".into(),
            body: "{{LOCATIONS}}".into(),
            image_url: None,
            link_url: None,
            sort_order: 0,
            starts_at: None,
            ends_at: None,
            active: true,
        };
        let html = render_menu([&banner], Vec::new(), Vec::new());
        assert!(html.contains("<h2>{{MENU}}</h2><p>{{LOCATIONS}}</p>"));
        assert!(html.contains("being prepared"));
    }

    #[test]
    fn unknown_placeholders_are_left_alone() {
        assert_eq!(fill("a {{X}} {{Y}} {{", &[("X", "1")]), "a 1 {{Y}} {{");
    }
}
