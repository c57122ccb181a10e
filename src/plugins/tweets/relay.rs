//! Posting stream events into the channels that follow them

use std::sync::Arc;

use crate::application::errors::StorageError;
use crate::application::services::FollowStore;
use crate::domain::entities::{Embed, FollowOptions, LinkButton, OutgoingMessage, StreamEvent, Tweet};
use crate::domain::traits::Bot;

pub fn tweet_embed(tweet: &Tweet, colour: u32) -> Embed {
    let mut embed = Embed::new()
        .description(&tweet.text)
        .url(tweet.url())
        .colour(colour);
    match &tweet.author {
        Some(author) => {
            embed = embed.author(
                format!("{} (@{})", author.name, author.username),
                Some(author.profile_url()),
                author.profile_image_url.clone(),
            );
        }
        None => embed = embed.author(tweet.author_id.clone(), Some(tweet.url()), None),
    }
    if let Some(created) = tweet.created_at {
        embed = embed.timestamp(created);
    }
    if let Some(media) = &tweet.media_url {
        embed = embed.image(media);
    }
    embed
}

/// Intent links for liking, retweeting and replying
pub fn tweet_buttons(tweet: &Tweet) -> Vec<LinkButton> {
    vec![
        LinkButton::new("Like", format!("https://twitter.com/intent/like?tweet_id={}", tweet.id)),
        LinkButton::new("Retweet", format!("https://twitter.com/intent/retweet?tweet_id={}", tweet.id)),
        LinkButton::new("Reply", format!("https://twitter.com/intent/tweet?in_reply_to={}", tweet.id)),
    ]
}

pub fn format_tweet(tweet: &Tweet, options: &FollowOptions, add_buttons: bool, colour: u32) -> OutgoingMessage {
    let mut message = if options.embeds {
        OutgoingMessage::embed(tweet_embed(tweet, colour))
    } else {
        OutgoingMessage::text(tweet.url())
    };
    if add_buttons {
        for button in tweet_buttons(tweet) {
            message = message.with_button(button);
        }
    }
    message
}

/// Fans stream events out to following channels
pub struct Relay {
    bot: Arc<dyn Bot>,
    follows: Arc<FollowStore>,
    colour: u32,
}

impl Relay {
    pub fn new(bot: Arc<dyn Bot>, follows: Arc<FollowStore>, colour: u32) -> Self {
        Self { bot, follows, colour }
    }

    /// Post `event` everywhere it is followed, returning how many posts went out
    pub async fn deliver(&self, event: &StreamEvent) -> Result<usize, StorageError> {
        let targets = self.follows.targets_for(event).await?;
        let mut posted = 0;
        for target in targets {
            let message = format_tweet(&event.tweet, &target.options, target.add_buttons, self.colour);
            match self.bot.send(&target.channel_id, message).await {
                Ok(_) => posted += 1,
                Err(e) => tracing::warn!(
                    "Could not post tweet {} in {}: {}",
                    event.tweet.id,
                    target.channel_id,
                    e
                ),
            }
        }
        tracing::debug!("Tweet {} posted in {} channels", event.tweet.id, posted);
        Ok(posted)
    }
}
