//! Email body templates.
//!
//! Templates are rendered in Portuguese, matching the platform's audience.
//! Each render produces a subject, an HTML body and a plain text body.

/// Salutation used when the recipient has no display name on file.
pub const DEFAULT_RECIPIENT_NAME: &str = "Usuário";

pub const VERIFICATION_SUBJECT: &str = "Confirme seu e-mail";
pub const PASSWORD_RESET_SUBJECT: &str = "Redefinição de senha";
pub const TEST_VERIFICATION_SUBJECT: &str = "Teste de verificação de e-mail";
pub const TEST_PASSWORD_RESET_SUBJECT: &str = "Teste de redefinição de senha";

/// A fully rendered email ready for dispatch.
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Resolves the salutation for a recipient.
pub fn recipient_name(name: Option<&str>) -> &str {
    name.map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_RECIPIENT_NAME)
}

pub fn verification_email(name: &str, verification_url: &str) -> RenderedEmail {
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .button {{ background-color: #007bff; color: white; padding: 12px 24px; text-decoration: none; border-radius: 4px; display: inline-block; margin: 20px 0; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>Confirmação de e-mail</h2>
        <p>Olá {name},</p>
        <p>Clique no botão abaixo para confirmar seu endereço de e-mail:</p>
        <a href="{url}" class="button">Confirmar e-mail</a>
        <p>Se o botão não funcionar, copie e cole este link no navegador:</p>
        <p><a href="{url}">{url}</a></p>
        <p>Se você não criou uma conta, ignore este e-mail.</p>
    </div>
</body>
</html>"#,
        name = name,
        url = verification_url
    );

    let text = format!(
        "Olá {name},\n\nConfirme seu endereço de e-mail acessando o link abaixo:\n\n{url}\n\nSe você não criou uma conta, ignore este e-mail.\n",
        name = name,
        url = verification_url
    );

    RenderedEmail {
        subject: VERIFICATION_SUBJECT.to_string(),
        html,
        text,
    }
}

pub fn password_reset_email(name: &str, reset_url: &str) -> RenderedEmail {
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .button {{ background-color: #dc3545; color: white; padding: 12px 24px; text-decoration: none; border-radius: 4px; display: inline-block; margin: 20px 0; }}
        .warning {{ color: #666; font-size: 14px; margin-top: 20px; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>Redefinição de senha</h2>
        <p>Olá {name},</p>
        <p>Recebemos um pedido para redefinir sua senha. Clique no botão abaixo para escolher uma nova:</p>
        <a href="{url}" class="button">Redefinir senha</a>
        <p class="warning">Este link expira em 1 hora.</p>
        <p class="warning">Se você não pediu a redefinição, ignore este e-mail e sua senha permanecerá a mesma.</p>
    </div>
</body>
</html>"#,
        name = name,
        url = reset_url
    );

    let text = format!(
        "Olá {name},\n\nRecebemos um pedido para redefinir sua senha. Acesse o link abaixo para escolher uma nova:\n\n{url}\n\nEste link expira em 1 hora. Se você não pediu a redefinição, ignore este e-mail.\n",
        name = name,
        url = reset_url
    );

    RenderedEmail {
        subject: PASSWORD_RESET_SUBJECT.to_string(),
        html,
        text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_template_embeds_name_and_url() {
        let rendered = verification_email("Maria", "https://correio.dev/verify-email?token=abc");

        assert_eq!(rendered.subject, "Confirme seu e-mail");
        assert!(rendered.html.contains("Olá Maria,"));
        assert!(rendered
            .html
            .contains("https://correio.dev/verify-email?token=abc"));
        assert!(rendered
            .text
            .contains("https://correio.dev/verify-email?token=abc"));
    }

    #[test]
    fn password_reset_template_warns_about_expiry() {
        let rendered = password_reset_email("João", "https://correio.dev/reset-password?token=xyz");

        assert_eq!(rendered.subject, "Redefinição de senha");
        assert!(rendered.html.contains("Olá João,"));
        assert!(rendered.html.contains("Este link expira em 1 hora."));
        assert!(rendered
            .text
            .contains("https://correio.dev/reset-password?token=xyz"));
    }

    #[test]
    fn recipient_name_falls_back_to_default() {
        assert_eq!(recipient_name(Some("Ana")), "Ana");
        assert_eq!(recipient_name(Some("  Ana  ")), "Ana");
        assert_eq!(recipient_name(Some("   ")), "Usuário");
        assert_eq!(recipient_name(None), "Usuário");
    }
}
