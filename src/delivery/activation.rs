use chrono::Utc;

use url::Url;

use crate::client::Email;
use crate::domain::Action;
use crate::error::{Error, Result};
use crate::model::{Newsletter, Subscription};
use crate::templates::{context, Value};

use super::{Delivery, DATE_FORMAT};

impl Delivery {
    /// Link confirming `action` for a subscription
    pub fn activation_url(&self, newsletter: &Newsletter, subscription: &Subscription, action: Action) -> Url {
        self.newsletter_url(
            &newsletter.slug,
            &[
                "subscription",
                subscription.email(),
                action.as_str(),
                "activate",
                &subscription.activation_code,
            ],
        )
    }

    /// Ask the subscriber to confirm a subscribe, unsubscribe or update
    #[tracing::instrument(
        name = "Send activation email",
        skip(self, newsletter, subscription),
        fields(newsletter = %newsletter.slug, subscription_id = %subscription.id)
    )]
    pub async fn send_activation_email(
        &self,
        newsletter: &Newsletter,
        subscription: &Subscription,
        action: Action,
    ) -> Result<()> {
        if !action.is_subscription_action() {
            return Err(Error::UnsupportedAction(action));
        }

        let templates = self.templates.templates_for(newsletter, action).await?;
        let activation_url = self.activation_url(newsletter, subscription, action);

        let context = context! {
            subscription => context! {
                name => subscription.name().unwrap_or_default(),
                email => subscription.email(),
                activation_code => &subscription.activation_code,
            },
            newsletter => context! { title => &newsletter.title },
            site => context! { domain => self.site_domain() },
            date => Utc::now().format(DATE_FORMAT).to_string(),
            activation_url => Value::from_safe_string(activation_url.to_string()),
        };

        let rendered = templates.render(&context)?;

        let email = Email {
            from: newsletter.sender_address(),
            to: subscription.recipient(),
            subject: rendered.subject,
            text_body: rendered.text,
            html_body: rendered.html,
            headers: vec![],
            attachments: vec![],
        };

        self.email_client.send(&email).await
    }
}
