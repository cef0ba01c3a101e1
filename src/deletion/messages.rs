//! User-facing messages for the public flow, in English and German.

pub fn request_sent(language: &str) -> String {
    match language {
        "de" => "Eine Bestätigungs-E-Mail wurde gesendet. Bitte überprüfen Sie Ihr Postfach.",
        _ => "A confirmation email has been sent. Please check your inbox.",
    }
    .to_string()
}

pub fn invalid_email(language: &str) -> String {
    match language {
        "de" => "Bitte geben Sie eine gültige E-Mail-Adresse ein.",
        _ => "Please enter a valid email address.",
    }
    .to_string()
}

pub fn send_failed(language: &str) -> String {
    match language {
        "de" => {
            "Die Bestätigungs-E-Mail konnte nicht gesendet werden. Bitte versuchen Sie es später erneut."
        }
        _ => "The confirmation email could not be sent. Please try again later.",
    }
    .to_string()
}

pub fn invalid_code(language: &str) -> String {
    match language {
        "de" => "Der Bestätigungscode ist ungültig oder abgelaufen.",
        _ => "The confirmation code is invalid or has expired.",
    }
    .to_string()
}

pub fn deleted(language: &str) -> String {
    match language {
        "de" => "Ihr Konto und Ihre persönlichen Daten wurden gelöscht.",
        _ => "Your account and personal data have been deleted.",
    }
    .to_string()
}

pub fn user_not_found(language: &str) -> String {
    match language {
        "de" => "Für diese E-Mail-Adresse wurde kein Konto gefunden.",
        _ => "No account was found for this email address.",
    }
    .to_string()
}

pub fn deletion_failed(language: &str) -> String {
    match language {
        "de" => {
            "Ihre Anfrage konnte nicht abgeschlossen werden. Bitte kontaktieren Sie den Support."
        }
        _ => "Your request could not be completed. Please contact support.",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_language_falls_back_to_english() {
        assert_eq!(request_sent("fr"), request_sent("en"));
        assert_ne!(request_sent("de"), request_sent("en"));
    }
}
