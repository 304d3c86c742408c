use std::time::Duration;
use worldmap_common::{Ease, PlayerId};
use worldmap_render::{Repeat, TweenId, TweenProp, TweenSpec, Tweens, VisualId};

use crate::SceneStage;

pub const HIGHLIGHT_TINT: u32 = 0xffff00;
const PULSE: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Highlighted {
    player: PlayerId,
    character: VisualId,
    pulse: TweenId,
}

/// At most one highlighted player.
#[derive(Debug, Default)]
pub struct Selection {
    current: Option<Highlighted>,
}

impl Selection {
    pub fn selected(&self) -> Option<&PlayerId> {
        self.current.as_ref().map(|h| &h.player)
    }

    /// Highlight `player`, clearing any previous highlight. Returns false when
    /// `player` was already selected.
    pub fn highlight(
        &mut self,
        player: &PlayerId,
        character: VisualId,
        stage: &mut SceneStage,
        tweens: &mut Tweens,
    ) -> bool {
        if self.selected() == Some(player) {
            return false;
        }
        self.clear(stage, tweens);
        stage.update(character, |v| v.tint = Some(HIGHLIGHT_TINT));
        let pulse = tweens.add(
            character,
            TweenSpec::new(TweenProp::Alpha { from: 1.0, to: 0.5 }, PULSE, Ease::SineInOut)
                .yoyo()
                .repeat(Repeat::Forever),
        );
        tracing::debug!(%player, "player highlighted");
        self.current = Some(Highlighted {
            player: player.clone(),
            character,
            pulse,
        });
        true
    }

    pub fn clear(&mut self, stage: &mut SceneStage, tweens: &mut Tweens) {
        let Some(h) = self.current.take() else {
            return;
        };
        tweens.kill(h.pulse);
        stage.update(h.character, |v| {
            v.tint = None;
            v.alpha = 1.0;
        });
    }

    /// Drop the highlight if it belongs to `player`, e.g. before recycling it.
    pub fn forget(&mut self, player: &PlayerId, stage: &mut SceneStage, tweens: &mut Tweens) {
        if self.selected() == Some(player) {
            self.clear(stage, tweens);
        }
    }
}
