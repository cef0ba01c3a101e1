//! Built-in confirmation email templates (English and German).
//!
//! Placeholders: `{user_email}`, `{confirmation_code}`, `{confirmation_link}`.

pub const SUBJECT_EN: &str = "Confirm Your Data Deletion Request";
pub const SUBJECT_DE: &str = "Bestätigen Sie Ihre Datenlöschungsanfrage";

pub const BODY_EN: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Data Deletion Confirmation</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <div style="background: #f8f9fa; padding: 20px; border-radius: 8px; margin-bottom: 20px;">
        <h1 style="color: #0073aa; margin: 0 0 20px 0; font-size: 24px;">Data Deletion Request</h1>

        <p>Dear {user_email},</p>

        <p>We have received your request to delete your personal data from our system. To proceed with this request, please confirm your intention by clicking the link below or entering the confirmation code.</p>

        <div style="background: #fff; padding: 20px; border-radius: 5px; margin: 20px 0; text-align: center;">
            <a href="{confirmation_link}" style="background: #0073aa; color: #fff; padding: 12px 24px; text-decoration: none; border-radius: 5px; display: inline-block; font-weight: bold;">Confirm Deletion Request</a>
        </div>

        <p><strong>Confirmation Code:</strong> <code style="background: #f1f1f1; padding: 5px 10px; border-radius: 3px; font-family: monospace;">{confirmation_code}</code></p>

        <p>If you did not request this deletion, please ignore this email. Your data will remain secure.</p>

        <p>This confirmation link will expire in 1 hour for security reasons.</p>

        <hr style="border: none; border-top: 1px solid #ddd; margin: 30px 0;">

        <p style="font-size: 12px; color: #666;">
            This is an automated message. Please do not reply to this email.<br>
            If you have any questions, please contact our support team.
        </p>
    </div>
</body>
</html>"#;

pub const BODY_DE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Datenlöschungsbestätigung</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <div style="background: #f8f9fa; padding: 20px; border-radius: 8px; margin-bottom: 20px;">
        <h1 style="color: #0073aa; margin: 0 0 20px 0; font-size: 24px;">Datenlöschungsanfrage</h1>

        <p>Sehr geehrte/r {user_email},</p>

        <p>Wir haben Ihre Anfrage zur Löschung Ihrer persönlichen Daten aus unserem System erhalten. Um mit dieser Anfrage fortzufahren, bestätigen Sie bitte Ihre Absicht durch Klicken auf den untenstehenden Link oder durch Eingabe des Bestätigungscodes.</p>

        <div style="background: #fff; padding: 20px; border-radius: 5px; margin: 20px 0; text-align: center;">
            <a href="{confirmation_link}" style="background: #0073aa; color: #fff; padding: 12px 24px; text-decoration: none; border-radius: 5px; display: inline-block; font-weight: bold;">Löschungsanfrage bestätigen</a>
        </div>

        <p><strong>Bestätigungscode:</strong> <code style="background: #f1f1f1; padding: 5px 10px; border-radius: 3px; font-family: monospace;">{confirmation_code}</code></p>

        <p>Falls Sie diese Löschung nicht angefordert haben, ignorieren Sie bitte diese E-Mail. Ihre Daten bleiben sicher.</p>

        <p>Dieser Bestätigungslink läuft aus Sicherheitsgründen in 1 Stunde ab.</p>

        <hr style="border: none; border-top: 1px solid #ddd; margin: 30px 0;">

        <p style="font-size: 12px; color: #666;">
            Dies ist eine automatische Nachricht. Bitte antworten Sie nicht auf diese E-Mail.<br>
            Bei Fragen wenden Sie sich bitte an unser Support-Team.
        </p>
    </div>
</body>
</html>"#;

/// Subject and body for the requested language, falling back to English.
pub fn for_language(language: &str) -> (&'static str, &'static str) {
    match language {
        "de" => (SUBJECT_DE, BODY_DE),
        _ => (SUBJECT_EN, BODY_EN),
    }
}

/// Substitute placeholders into a template.
pub fn render(template: &str, email: &str, code: &str, link: &str) -> String {
    template
        .replace("{user_email}", email)
        .replace("{confirmation_code}", code)
        .replace("{confirmation_link}", link)
}
