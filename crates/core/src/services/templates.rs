//! Email templates.
//!
//! Bodies use `{{name}}` placeholders filled by [`render`].

use super::mailer::OutgoingMail;

const MAGIC_LINK_TEXT: &str = "Hello {{username}},

You requested a magic link to sign in to {{blogName}}. Click the link below to access your account:

{{magicLinkUrl}}

This link will expire in {{expirationMinutes}} minutes and can only be used once.

If you didn't request this link, please ignore this email.

Best regards,
The {{blogName}} Team
";

const MAGIC_LINK_HTML: &str = "<html><body>
<h2>Sign in to {{blogName}}</h2>
<p>Hello {{username}},</p>
<p>Click the button below to sign in. This link expires in {{expirationMinutes}} minutes and can only be used once.</p>
<p><a href=\"{{magicLinkUrl}}\">Sign in</a></p>
<p>If you didn't request this link, please ignore this email.</p>
</body></html>
";

const VERIFICATION_HTML: &str = "<html><body>
<h2>Verify your subscription to {{blogName}}</h2>
<p>Thanks for subscribing! Please confirm your email address to start receiving updates.</p>
<p><a href=\"{{verificationUrl}}\">Verify Your Subscription</a></p>
<p>If you didn't subscribe to {{blogName}}, you can ignore this email.</p>
</body></html>
";

const WELCOME_HTML: &str = "<html><body>
<h2>Welcome to {{blogName}}!</h2>
<p>Your subscription is confirmed. Notification preference: {{notificationType}}.</p>
<p>Thanks for joining {{blogName}}.</p>
</body></html>
";

const UNSUBSCRIBED_HTML: &str = "<html><body>
<h2>You have been unsubscribed</h2>
<p>You will no longer receive emails from {{blogName}}.</p>
</body></html>
";

const NEW_POST_HTML: &str = "<html><body>
<h2>New post on {{blogName}}</h2>
<h3><a href=\"{{postUrl}}\">{{postTitle}}</a></h3>
<p>{{excerpt}}</p>
<p>You are receiving this because you subscribed to {{blogName}}.</p>
</body></html>
";

/// Replace every `{{key}}` in `template` with its value.
#[must_use]
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{{{key}}}}}"), value)
    })
}

/// Strip tags from an HTML body to get a plain-text alternative.
fn plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Magic link sign-in message.
#[must_use]
pub fn magic_link(
    to: &str,
    username: Option<&str>,
    magic_link_url: &str,
    blog_name: &str,
    expiration_minutes: i64,
) -> OutgoingMail {
    let minutes = expiration_minutes.to_string();
    let vars = [
        ("username", username.unwrap_or("there")),
        ("magicLinkUrl", magic_link_url),
        ("blogName", blog_name),
        ("expirationMinutes", minutes.as_str()),
    ];
    OutgoingMail {
        to: to.to_string(),
        subject: format!("Sign in to {blog_name}"),
        text_body: render(MAGIC_LINK_TEXT, &vars),
        html_body: Some(render(MAGIC_LINK_HTML, &vars)),
    }
}

/// Subscription verification message.
#[must_use]
pub fn subscription_verification(to: &str, verification_url: &str, blog_name: &str) -> OutgoingMail {
    let html = render(
        VERIFICATION_HTML,
        &[("verificationUrl", verification_url), ("blogName", blog_name)],
    );
    OutgoingMail {
        to: to.to_string(),
        subject: format!("Verify your subscription to {blog_name}"),
        text_body: plain_text(&html).replace("Verify Your Subscription", verification_url),
        html_body: Some(html),
    }
}

/// Welcome message after verification.
#[must_use]
pub fn welcome(to: &str, notification_type: &str, blog_name: &str) -> OutgoingMail {
    let html = render(
        WELCOME_HTML,
        &[("blogName", blog_name), ("notificationType", notification_type)],
    );
    OutgoingMail {
        to: to.to_string(),
        subject: format!("Welcome to {blog_name}!"),
        text_body: plain_text(&html),
        html_body: Some(html),
    }
}

/// Unsubscribe confirmation.
#[must_use]
pub fn unsubscribed(to: &str, blog_name: &str) -> OutgoingMail {
    let html = render(UNSUBSCRIBED_HTML, &[("blogName", blog_name)]);
    OutgoingMail {
        to: to.to_string(),
        subject: format!("Unsubscribed from {blog_name}"),
        text_body: plain_text(&html),
        html_body: Some(html),
    }
}

/// New post notification.
#[must_use]
pub fn new_post(
    to: &str,
    post_title: &str,
    post_url: &str,
    excerpt: &str,
    blog_name: &str,
) -> OutgoingMail {
    let html = render(
        NEW_POST_HTML,
        &[
            ("blogName", blog_name),
            ("postUrl", post_url),
            ("postTitle", post_title),
            ("excerpt", excerpt),
        ],
    );
    OutgoingMail {
        to: to.to_string(),
        subject: format!("New post: {post_title}"),
        text_body: format!("{}\n{post_url}", plain_text(&html)),
        html_body: Some(html),
    }
}
