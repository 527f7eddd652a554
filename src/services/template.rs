use std::collections::HashMap;

/// Built-in status notification templates, addressed by the template id
/// carried in the email job payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTemplate {
    VerificationSubmitted,
    VerificationApproved,
    VerificationDenied,
}

impl StatusTemplate {
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "verification_submitted" => Some(Self::VerificationSubmitted),
            "verification_approved" => Some(Self::VerificationApproved),
            "verification_denied" => Some(Self::VerificationDenied),
            _ => None,
        }
    }

    fn body(&self) -> &'static str {
        match self {
            Self::VerificationSubmitted => SUBMITTED_TEMPLATE,
            Self::VerificationApproved => APPROVED_TEMPLATE,
            Self::VerificationDenied => DENIED_TEMPLATE,
        }
    }
}

/// Render a named template, replacing `{{variable}}` placeholders with the
/// supplied values. Unknown placeholders are left in place; unknown template
/// ids are an error the mailer downgrades to a warning.
pub fn render(template_id: &str, vars: &HashMap<String, String>) -> Result<String, TemplateError> {
    let template = StatusTemplate::from_id(template_id)
        .ok_or_else(|| TemplateError::UnknownTemplate(template_id.to_string()))?;

    let mut body = template.body().to_string();
    for (key, value) in vars {
        let placeholder = format!("{{{{{}}}}}", key);
        body = body.replace(&placeholder, value);
    }
    Ok(body)
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Unknown email template: {0}")]
    UnknownTemplate(String),
}

const SUBMITTED_TEMPLATE: &str = "\
Hi {{full_name}},

Your identity verification photos have been submitted for review.
You will receive another email once the review is complete. This
usually takes a few days.

Thanks,
The {{platform_name}} team
";

const APPROVED_TEMPLATE: &str = "\
Hi {{full_name}},

Your identity verification has been approved. Your account is now
verified until {{expiration_date}}.

Thanks,
The {{platform_name}} team
";

const DENIED_TEMPLATE: &str = "\
Hi {{full_name}},

Unfortunately we could not verify your identity from the photos you
submitted, for the following reason:

    {{denial_reason}}

You can submit new photos at any time: {{reverify_url}}

Thanks,
The {{platform_name}} team
";
